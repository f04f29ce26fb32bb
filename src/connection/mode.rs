// ============================================================================
// Mode Gate
// ============================================================================
//
// Decides whether the process runs purely in memory (Local) or synchronized
// with the remote store, and hands out the remote store only while an
// authenticated session exists.
//
//   Local                       terminal; chosen when no remote config exists
//   Authenticating   ──ok──▶    AuthenticatedRemote
//        │  ▲                        │
//      fail │ sign_in             sign_out / expiry
//        ▼  │                        ▼
//   Unauthenticated  ◀───────────────┘
//
// ============================================================================

use super::auth::{Authenticator, Credentials, Session};
use super::config::SyncConfig;
use crate::core::{Result, SyncError};
use crate::remote::RemoteStore;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Actor recorded for changes made without a signed-in user
pub const SYSTEM_ACTOR: &str = "system";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncMode {
    Unauthenticated,
    Authenticating,
    AuthenticatedRemote,
    Local,
}

impl SyncMode {
    pub fn is_remote(self) -> bool {
        self == SyncMode::AuthenticatedRemote
    }

    pub fn is_local(self) -> bool {
        self == SyncMode::Local
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncMode::Unauthenticated => "unauthenticated",
            SyncMode::Authenticating => "authenticating",
            SyncMode::AuthenticatedRemote => "remote",
            SyncMode::Local => "local",
        };
        f.write_str(name)
    }
}

pub struct ModeGate {
    mode: watch::Sender<SyncMode>,
    session: Mutex<Option<Session>>,
    remote: Option<Arc<dyn RemoteStore>>,
    authenticator: Option<Arc<dyn Authenticator>>,
}

impl ModeGate {
    /// Gate for a configured process: `Authenticating` when the remote
    /// parameters are usable, `Local` otherwise.
    pub fn new(
        config: &SyncConfig,
        remote: Arc<dyn RemoteStore>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        match config.validate() {
            Ok(()) => {
                info!("remote configuration present ({}), awaiting authentication", config);
                Self::with_mode(SyncMode::Authenticating, Some(remote), Some(authenticator))
            }
            Err(reason) => {
                info!("running in local mode: {}", reason);
                Self::local()
            }
        }
    }

    /// Gate for a process without remote configuration
    pub fn local() -> Self {
        Self::with_mode(SyncMode::Local, None, None)
    }

    fn with_mode(
        mode: SyncMode,
        remote: Option<Arc<dyn RemoteStore>>,
        authenticator: Option<Arc<dyn Authenticator>>,
    ) -> Self {
        let (sender, _) = watch::channel(mode);
        Self {
            mode: sender,
            session: Mutex::new(None),
            remote,
            authenticator,
        }
    }

    pub fn mode(&self) -> SyncMode {
        *self.mode.borrow()
    }

    pub fn is_remote(&self) -> bool {
        self.mode().is_remote()
    }

    /// Receiver notified on every mode transition
    pub fn subscribe(&self) -> watch::Receiver<SyncMode> {
        self.mode.subscribe()
    }

    pub fn session(&self) -> Option<Session> {
        self.session.lock().ok().and_then(|session| session.clone())
    }

    /// User name of the current session, or [`SYSTEM_ACTOR`]
    pub fn actor(&self) -> String {
        self.session()
            .map(|session| session.user().to_string())
            .unwrap_or_else(|| SYSTEM_ACTOR.to_string())
    }

    /// The remote store, available only in `AuthenticatedRemote`
    pub fn remote(&self) -> Result<Arc<dyn RemoteStore>> {
        let mode = self.mode();
        match (&self.remote, mode) {
            (Some(remote), SyncMode::AuthenticatedRemote) => Ok(Arc::clone(remote)),
            _ => Err(SyncError::RemoteUnavailable(mode)),
        }
    }

    /// Runs the credential check; `Authenticating`/`Unauthenticated` only.
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<Session> {
        let from = self.mode();
        if !matches!(from, SyncMode::Authenticating | SyncMode::Unauthenticated) {
            return Err(SyncError::InvalidTransition {
                from,
                action: "sign in",
            });
        }
        let authenticator = self
            .authenticator
            .as_ref()
            .ok_or(SyncError::InvalidTransition {
                from,
                action: "sign in",
            })?;

        self.transition(SyncMode::Authenticating);
        match authenticator.authenticate(credentials).await {
            Ok(session) => {
                if self.mode() != SyncMode::Authenticating {
                    // Signed out while the check was in flight.
                    return Err(SyncError::AuthenticationFailed(
                        "session ended during sign-in".into(),
                    ));
                }
                self.set_session(Some(session.clone()))?;
                self.transition(SyncMode::AuthenticatedRemote);
                info!("signed in as '{}'", session.user());
                Ok(session)
            }
            Err(err) => {
                warn!("sign-in failed for '{}': {}", credentials.username, err);
                self.transition(SyncMode::Unauthenticated);
                Err(err)
            }
        }
    }

    /// Resolves the initial `Authenticating` state from a persisted session.
    pub fn restore_session(&self, session: Option<Session>) -> Result<SyncMode> {
        let from = self.mode();
        if from != SyncMode::Authenticating {
            return Err(SyncError::InvalidTransition {
                from,
                action: "restore a session",
            });
        }

        let next = match session {
            Some(session) => {
                info!("restored session for '{}'", session.user());
                self.set_session(Some(session))?;
                SyncMode::AuthenticatedRemote
            }
            None => SyncMode::Unauthenticated,
        };
        self.transition(next);
        Ok(next)
    }

    pub fn sign_out(&self) -> Result<()> {
        self.end_session("sign out")
    }

    pub fn session_expired(&self) -> Result<()> {
        self.end_session("expire the session")
    }

    fn end_session(&self, action: &'static str) -> Result<()> {
        let from = self.mode();
        if from == SyncMode::Local {
            return Err(SyncError::InvalidTransition { from, action });
        }

        self.set_session(None)?;
        self.transition(SyncMode::Unauthenticated);
        info!("session ended ({}) from {} mode", action, from);
        Ok(())
    }

    fn set_session(&self, session: Option<Session>) -> Result<()> {
        *self.session.lock()? = session;
        Ok(())
    }

    fn transition(&self, next: SyncMode) {
        let previous = self.mode.send_replace(next);
        if previous != next {
            debug!("mode transition: {} -> {}", previous, next);
        }
    }
}

impl fmt::Debug for ModeGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModeGate")
            .field("mode", &self.mode())
            .field("actor", &self.actor())
            .finish()
    }
}
