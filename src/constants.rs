pub mod tokens {

    /// Session bearer tokens: 32 random bytes, hex encoded (64 chars).
    pub const SESSION_TOKEN_BYTES: usize = 32;

    /// Activation and reset secrets: 16 random bytes, hex encoded (32 chars).
    /// Shorter than session tokens; single-use with a small exposure window.
    pub const SECRET_BYTES: usize = 16;
}

pub mod sessions {

    pub const DEFAULT_TTL_DAYS: u32 = 7;

    pub const DEFAULT_SWEEP_INTERVAL_MINUTES: u32 = 60;
}
