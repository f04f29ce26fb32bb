use crate::baseline::BaselineDataset;
use crate::connection::{Authenticator, Credentials, ModeGate, Session, SyncConfig, SyncMode};
use crate::core::{Result, SyncError};
use crate::remote::{RemoteStore, TableId};
use crate::sync::{ActivityLogger, LoadOutcome, SeedCoordinator, SeedReport, StoreRegistry};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// What happened when a session was established
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub session: Session,
    pub seed: Result<SeedReport>,
    pub loads: BTreeMap<TableId, LoadOutcome>,
}

/// Entry point of the synchronization core.
///
/// Owns the mode gate, the seeding coordinator, the store registry and the
/// activity logger, and drives them through the authentication lifecycle.
///
/// # Examples
///
/// ```
/// use syncdeck::{BaselineDataset, SyncEngine, TableId};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> syncdeck::Result<()> {
/// let engine = SyncEngine::local(BaselineDataset::embedded()?)?;
/// engine.start().await;
///
/// let products = engine.registry().collection(TableId::Products)?;
/// products.update("prd-chair", |chair| chair.set("stock", 38)).await?;
/// # Ok(())
/// # }
/// ```
pub struct SyncEngine {
    gate: Arc<ModeGate>,
    baseline: Arc<BaselineDataset>,
    seeder: SeedCoordinator,
    registry: StoreRegistry,
    activity: Arc<ActivityLogger>,
}

impl SyncEngine {
    /// Builds the engine. Must be called inside a tokio runtime.
    pub fn open(
        config: &SyncConfig,
        remote: Arc<dyn RemoteStore>,
        authenticator: Arc<dyn Authenticator>,
        baseline: BaselineDataset,
    ) -> Result<Self> {
        let gate = Arc::new(ModeGate::new(config, remote, authenticator));
        Self::assemble(gate, baseline, config.seed_marker)
    }

    /// Engine without remote configuration
    pub fn local(baseline: BaselineDataset) -> Result<Self> {
        Self::assemble(Arc::new(ModeGate::local()), baseline, TableId::Users)
    }

    fn assemble(gate: Arc<ModeGate>, baseline: BaselineDataset, marker: TableId) -> Result<Self> {
        baseline.validate()?;
        let baseline = Arc::new(baseline);
        let activity = ActivityLogger::spawn(Arc::clone(&gate));
        let registry =
            StoreRegistry::from_baseline(&baseline, Arc::clone(&gate), Some(Arc::clone(&activity)))?;
        let seeder = SeedCoordinator::new(Arc::clone(&gate), Arc::clone(&baseline), marker);

        Ok(Self {
            gate,
            baseline,
            seeder,
            registry,
            activity,
        })
    }

    pub fn mode(&self) -> SyncMode {
        self.gate.mode()
    }

    pub fn gate(&self) -> &Arc<ModeGate> {
        &self.gate
    }

    pub fn registry(&self) -> &StoreRegistry {
        &self.registry
    }

    pub fn activity(&self) -> &Arc<ActivityLogger> {
        &self.activity
    }

    pub fn baseline(&self) -> &BaselineDataset {
        &self.baseline
    }

    /// Populates the stores in Local mode; remote stores wait for a session.
    pub async fn start(&self) -> BTreeMap<TableId, LoadOutcome> {
        match self.mode() {
            SyncMode::Local => self.registry.load_all().await,
            mode => {
                info!("start deferred until authentication ({} mode)", mode);
                BTreeMap::new()
            }
        }
    }

    pub async fn sign_in(&self, credentials: &Credentials) -> Result<SyncReport> {
        let session = self.gate.sign_in(credentials).await?;
        Ok(self.synchronize(session).await)
    }

    /// Resumes a persisted session, if any, from the initial state
    pub async fn restore_session(&self, session: Option<Session>) -> Result<Option<SyncReport>> {
        match self.gate.restore_session(session)? {
            SyncMode::AuthenticatedRemote => {
                let session = self.gate.session().ok_or_else(|| {
                    SyncError::AuthenticationFailed("restored session disappeared".into())
                })?;
                Ok(Some(self.synchronize(session).await))
            }
            _ => Ok(None),
        }
    }

    pub fn sign_out(&self) -> Result<()> {
        self.gate.sign_out()?;
        self.registry.reset()
    }

    pub fn session_expired(&self) -> Result<()> {
        self.gate.session_expired()?;
        self.registry.reset()
    }

    async fn synchronize(&self, session: Session) -> SyncReport {
        let seed = self.seeder.seed_if_empty().await;
        if let Err(err) = &seed {
            warn!("seeding did not run: {}", err);
        }

        let loads = self.registry.load_all().await;
        SyncReport {
            session,
            seed,
            loads,
        }
    }
}
