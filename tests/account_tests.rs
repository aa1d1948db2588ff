use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use sea_orm::EntityTrait;
use tokio::sync::Mutex;

use tessera::config::Config;
use tessera::db::Store;
use tessera::entities::users;
use tessera::services::{
    AccountError, AccountService, MailError, MailService, NewAccount, SessionError, SessionService,
};
use tessera::state::SharedState;

/// Records dispatched mail; flips to failure mode on demand.
struct MockMailer {
    fail: AtomicBool,
    sent: Mutex<Vec<(String, String, String)>>,
}

impl MockMailer {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            fail: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
        })
    }

    fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

#[async_trait]
impl MailService for MockMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(MailError::Transport("mock transport down".to_string()));
        }

        self.sent
            .lock()
            .await
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

async fn spawn_state() -> (SharedState, Arc<MockMailer>) {
    let store = Store::new("sqlite::memory:")
        .await
        .expect("Failed to create in-memory store");

    let mailer = MockMailer::new();
    let state = SharedState::with_collaborators(Config::default(), store, mailer.clone())
        .expect("Failed to build state");

    (state, mailer)
}

fn new_account(username: &str, email: &str) -> NewAccount {
    NewAccount {
        username: username.to_string(),
        email: email.to_string(),
        password: "correct-horse-battery".to_string(),
    }
}

async fn all_users(store: &Store) -> Vec<users::Model> {
    users::Entity::find().all(&store.conn).await.unwrap()
}

#[tokio::test]
async fn test_register_persists_one_inactive_user_with_secret() {
    let (state, mailer) = spawn_state().await;

    state
        .account_service
        .register(new_account("alice", "alice@example.com"))
        .await
        .unwrap();

    let users = all_users(&state.store).await;
    assert_eq!(users.len(), 1);

    let user = &users[0];
    assert_eq!(user.username, "alice");
    assert!(user.inactive);
    let secret = user.activation_token.as_deref().unwrap();
    assert_eq!(secret.len(), 32);

    // Exactly one email, carrying the activation secret.
    assert_eq!(mailer.sent_count().await, 1);
    let sent = mailer.sent.lock().await;
    assert_eq!(sent[0].0, "alice@example.com");
    assert!(sent[0].2.contains(secret));
}

#[tokio::test]
async fn test_register_rolls_back_when_dispatch_fails() {
    let (state, mailer) = spawn_state().await;
    mailer.set_failing(true);

    let result = state
        .account_service
        .register(new_account("bob", "bob@example.com"))
        .await;

    assert!(matches!(result, Err(AccountError::MailDispatch(_))));
    assert!(all_users(&state.store).await.is_empty());
}

#[tokio::test]
async fn test_register_rejects_taken_username() {
    let (state, _mailer) = spawn_state().await;

    state
        .account_service
        .register(new_account("carol", "carol@example.com"))
        .await
        .unwrap();

    let result = state
        .account_service
        .register(new_account("carol", "other@example.com"))
        .await;
    assert!(matches!(result, Err(AccountError::Taken)));

    let result = state
        .account_service
        .register(new_account("carol2", "carol@example.com"))
        .await;
    assert!(matches!(result, Err(AccountError::Taken)));
}

#[tokio::test]
async fn test_register_rejects_bad_input() {
    let (state, _mailer) = spawn_state().await;

    let mut bad_password = new_account("dave", "dave@example.com");
    bad_password.password = "short".to_string();
    assert!(matches!(
        state.account_service.register(bad_password).await,
        Err(AccountError::Validation(_))
    ));

    let bad_email = new_account("dave", "not-an-address");
    assert!(matches!(
        state.account_service.register(bad_email).await,
        Err(AccountError::Validation(_))
    ));

    assert!(all_users(&state.store).await.is_empty());
}

#[tokio::test]
async fn test_activation_is_single_use() {
    let (state, _mailer) = spawn_state().await;

    state
        .account_service
        .register(new_account("erin", "erin@example.com"))
        .await
        .unwrap();

    let secret = all_users(&state.store).await[0]
        .activation_token
        .clone()
        .unwrap();

    let user = state.account_service.activate(&secret).await.unwrap();
    assert!(!user.inactive);

    let row = &all_users(&state.store).await[0];
    assert!(!row.inactive);
    assert!(row.activation_token.is_none());

    // The secret was cleared by the first call; replay fails.
    let result = state.account_service.activate(&secret).await;
    assert!(matches!(result, Err(AccountError::InvalidActivationToken)));
}

#[tokio::test]
async fn test_activate_unknown_secret_changes_nothing() {
    let (state, _mailer) = spawn_state().await;

    state
        .account_service
        .register(new_account("frank", "frank@example.com"))
        .await
        .unwrap();

    let result = state.account_service.activate("0000000000000000").await;
    assert!(matches!(result, Err(AccountError::InvalidActivationToken)));

    let row = &all_users(&state.store).await[0];
    assert!(row.inactive);
    assert!(row.activation_token.is_some());
}

#[tokio::test]
async fn test_reset_request_unknown_email_writes_nothing() {
    let (state, mailer) = spawn_state().await;

    let result = state
        .account_service
        .request_password_reset("ghost@example.com")
        .await;

    assert!(matches!(result, Err(AccountError::EmailNotFound)));
    assert_eq!(mailer.sent_count().await, 0);
    assert!(all_users(&state.store).await.is_empty());
}

#[tokio::test]
async fn test_reset_secret_survives_dispatch_failure() {
    let (state, mailer) = spawn_state().await;

    state
        .account_service
        .register(new_account("grace", "grace@example.com"))
        .await
        .unwrap();

    // Unlike registration, the persisted secret is not rolled back when
    // the email fails.
    mailer.set_failing(true);
    let result = state
        .account_service
        .request_password_reset("grace@example.com")
        .await;
    assert!(matches!(result, Err(AccountError::MailDispatch(_))));

    let row = &all_users(&state.store).await[0];
    assert!(row.password_reset_token.is_some());
}

#[tokio::test]
async fn test_consume_reset_rotates_credentials_and_revokes_sessions() {
    let (state, mailer) = spawn_state().await;

    state
        .account_service
        .register(new_account("heidi", "heidi@example.com"))
        .await
        .unwrap();

    let secret = all_users(&state.store).await[0]
        .activation_token
        .clone()
        .unwrap();
    let user = state.account_service.activate(&secret).await.unwrap();

    let t1 = state.session_service.issue(user.id).await.unwrap();
    let t2 = state.session_service.issue(user.id).await.unwrap();

    state
        .account_service
        .request_password_reset("heidi@example.com")
        .await
        .unwrap();
    assert_eq!(mailer.sent_count().await, 2);

    let reset_secret = all_users(&state.store).await[0]
        .password_reset_token
        .clone()
        .unwrap();
    assert_eq!(reset_secret.len(), 32);

    state
        .account_service
        .consume_password_reset(&reset_secret, "brand-new-password")
        .await
        .unwrap();

    let row = &all_users(&state.store).await[0];
    assert!(row.password_reset_token.is_none());
    assert!(row.activation_token.is_none());
    assert!(!row.inactive);

    // Old credential is gone, new one works.
    assert!(
        !state
            .store
            .verify_user_password("heidi", "correct-horse-battery")
            .await
            .unwrap()
    );
    assert!(
        state
            .store
            .verify_user_password("heidi", "brand-new-password")
            .await
            .unwrap()
    );

    // Every session minted before the reset is dead.
    assert!(matches!(
        state.session_service.verify(&t1).await,
        Err(SessionError::Unauthorized)
    ));
    assert!(matches!(
        state.session_service.verify(&t2).await,
        Err(SessionError::Unauthorized)
    ));
}

#[tokio::test]
async fn test_consume_reset_unknown_secret_fails() {
    let (state, _mailer) = spawn_state().await;

    let result = state
        .account_service
        .consume_password_reset("ffffffffffffffff", "whatever-password")
        .await;

    assert!(matches!(result, Err(AccountError::ResetTokenNotFound)));
}

#[tokio::test]
async fn test_delete_account_revokes_sessions() {
    let (state, _mailer) = spawn_state().await;

    state
        .account_service
        .register(new_account("ivan", "ivan@example.com"))
        .await
        .unwrap();
    let secret = all_users(&state.store).await[0]
        .activation_token
        .clone()
        .unwrap();
    let user = state.account_service.activate(&secret).await.unwrap();

    let token = state.session_service.issue(user.id).await.unwrap();

    state.account_service.delete_account(user.id).await.unwrap();

    assert!(all_users(&state.store).await.is_empty());
    assert!(matches!(
        state.session_service.verify(&token).await,
        Err(SessionError::Unauthorized)
    ));
}
