use crate::core::{Result, SyncError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Credentials presented at sign-in
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// An authenticated session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    user: String,
    issued_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            issued_at: Utc::now(),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }
}

/// Credential check performed before the process may talk to the remote store
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session>;
}

/// Authenticator backed by bcrypt password hashes
pub struct PasswordAuthenticator {
    users: RwLock<HashMap<String, String>>,
    cost: u32,
}

impl PasswordAuthenticator {
    pub fn new() -> Self {
        Self::with_cost(bcrypt::DEFAULT_COST)
    }

    /// Authenticator hashing with a custom bcrypt cost (4..=31)
    pub fn with_cost(cost: u32) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            cost,
        }
    }

    /// Authenticator with a single account
    pub fn with_user(username: &str, password: &str) -> Result<Self> {
        Self::new().user(username, password)
    }

    /// Builder-style account registration, usable outside an async context
    pub fn user(self, username: &str, password: &str) -> Result<Self> {
        Self::check_account(username, password)?;
        let hash = self.hash_password(password)?;
        self.users
            .try_write()
            .map_err(|err| SyncError::LockError(err.to_string()))?
            .insert(username.to_string(), hash);
        Ok(self)
    }

    /// Registers or replaces an account
    pub async fn add_user(&self, username: &str, password: &str) -> Result<()> {
        Self::check_account(username, password)?;
        let hash = self.hash_password(password)?;
        self.users.write().await.insert(username.to_string(), hash);
        Ok(())
    }

    pub async fn remove_user(&self, username: &str) -> bool {
        self.users.write().await.remove(username).is_some()
    }

    fn check_account(username: &str, password: &str) -> Result<()> {
        if username.trim().is_empty() {
            return Err(SyncError::AuthenticationFailed(
                "Username cannot be empty".into(),
            ));
        }
        if password.is_empty() {
            return Err(SyncError::AuthenticationFailed(
                "Password cannot be empty".into(),
            ));
        }
        Ok(())
    }

    fn hash_password(&self, password: &str) -> Result<String> {
        bcrypt::hash(password, self.cost)
            .map_err(|err| SyncError::AuthenticationFailed(format!("Failed to hash password: {}", err)))
    }

    fn verify_password(password: &str, hash: &str) -> bool {
        bcrypt::verify(password, hash).unwrap_or(false)
    }
}

impl Default for PasswordAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Authenticator for PasswordAuthenticator {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session> {
        let users = self.users.read().await;

        let hash = users
            .get(&credentials.username)
            .ok_or_else(|| SyncError::AuthenticationFailed("Invalid username or password".into()))?;

        if !Self::verify_password(&credentials.password, hash) {
            return Err(SyncError::AuthenticationFailed(
                "Invalid username or password".into(),
            ));
        }

        Ok(Session::new(credentials.username.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_valid_credentials_open_session() {
        let auth = PasswordAuthenticator::with_cost(4).user("ana", "s3cret").unwrap();
        let session = auth
            .authenticate(&Credentials::new("ana", "s3cret"))
            .await
            .unwrap();

        assert_eq!(session.user(), "ana");
    }

    #[tokio::test]
    async fn test_wrong_password_is_rejected() {
        let auth = PasswordAuthenticator::with_cost(4).user("ana", "s3cret").unwrap();
        let result = auth.authenticate(&Credentials::new("ana", "nope")).await;

        assert!(matches!(result, Err(SyncError::AuthenticationFailed(_))));
    }

    #[tokio::test]
    async fn test_unknown_and_removed_users_are_rejected() {
        let auth = PasswordAuthenticator::with_cost(4);
        auth.add_user("leo", "pw").await.unwrap();
        assert!(auth.authenticate(&Credentials::new("leo", "pw")).await.is_ok());

        assert!(auth.remove_user("leo").await);
        assert!(auth.authenticate(&Credentials::new("leo", "pw")).await.is_err());
        assert!(auth.authenticate(&Credentials::new("ghost", "pw")).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_password_cannot_be_registered() {
        let auth = PasswordAuthenticator::with_cost(4);
        assert!(auth.add_user("leo", "").await.is_err());
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let debug = format!("{:?}", Credentials::new("ana", "s3cret"));
        assert!(!debug.contains("s3cret"));
    }
}
