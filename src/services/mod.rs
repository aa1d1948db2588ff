pub mod account_service;
pub mod account_service_impl;
pub use account_service::{AccountError, AccountService, NewAccount, ProfileUpdate};
pub use account_service_impl::SeaOrmAccountService;

pub mod mail_service;
pub mod mail_service_impl;
pub use mail_service::{MailError, MailService};
pub use mail_service_impl::HttpMailService;

pub mod session_service;
pub mod session_service_impl;
pub use session_service::{SessionError, SessionService};
pub use session_service_impl::SeaOrmSessionService;

pub mod sweeper;
pub use sweeper::Sweeper;
