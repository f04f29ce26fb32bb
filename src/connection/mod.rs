pub mod auth;
pub mod config;
pub mod mode;

pub use auth::{Authenticator, Credentials, PasswordAuthenticator, Session};
pub use config::{ENV_REMOTE_KEY, ENV_REMOTE_URL, SyncConfig};
pub use mode::{ModeGate, SYSTEM_ACTOR, SyncMode};
