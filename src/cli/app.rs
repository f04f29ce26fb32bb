use clap::{Parser, Subcommand};
use serde_json::Value;
use std::error::Error;
use std::sync::Arc;
use syncdeck::connection::ENV_REMOTE_URL;
use syncdeck::core::from_row;
use syncdeck::{
    ActivityEntry, BaselineDataset, BaselineEntry, CollectionStore, Credentials, Entity,
    InMemoryRemoteStore, LoadOutcome, PasswordAuthenticator, RemoteOp, SyncConfig, SyncEngine,
    SyncMode, TableId,
};

const DEMO_URL: &str = "https://demo.syncdeck.local";
const DEMO_KEY: &str = "demo-access-key";
const DEMO_USER: &str = "admin";
const DEMO_PASSWORD: &str = "admin";

#[derive(Parser, Debug)]
#[command(name = "syncdeck", version, about = "Local-first data synchronization core")]
pub struct App {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the tables and their remote names
    Tables,
    /// Summarize the embedded baseline dataset
    Baseline {
        /// Collection or document to print, e.g. `products`
        table: Option<String>,
        /// Print the full dataset as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show which mode the environment selects
    Mode,
    /// Run sign-in, seeding, a mutation and a rejected write against an in-memory remote
    Demo {
        /// Stay in local mode instead of signing in
        #[arg(long)]
        local: bool,
        /// Units taken out of stock for the demo product
        #[arg(long, default_value_t = 3)]
        take: i64,
    },
}

impl App {
    pub fn new() -> Self {
        Self::parse()
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error>> {
        match &self.command {
            Command::Tables => Self::tables(),
            Command::Baseline { table, json } => Self::baseline(table.as_deref(), *json)?,
            Command::Mode => Self::mode(),
            Command::Demo { local, take } => Self::demo(*local, *take).await?,
        }
        Ok(())
    }

    fn tables() {
        println!("{:<18} {:<20} {}", "COLLECTION", "REMOTE", "KIND");
        for table in TableId::ALL {
            let kind = if table.is_document() { "document" } else { "collection" };
            println!(
                "{:<18} {:<20} {}",
                table.collection_name(),
                table.remote_name(),
                kind
            );
        }
    }

    fn baseline(table: Option<&str>, json: bool) -> Result<(), Box<dyn Error>> {
        let dataset = BaselineDataset::embedded()?;
        if let Some(name) = table {
            let table = TableId::from_collection_name(name)
                .ok_or_else(|| format!("unknown collection '{}'", name))?;
            let rows = match dataset.document(table) {
                Some(fields) => serde_json::to_string_pretty(fields)?,
                None => serde_json::to_string_pretty(dataset.collection(table))?,
            };
            println!("{}", rows);
            return Ok(());
        }
        if json {
            println!("{}", serde_json::to_string_pretty(&dataset)?);
            return Ok(());
        }

        for entry in dataset.entries() {
            match entry {
                BaselineEntry::Collection(table, entities) => {
                    println!("{:<18} {} row(s)", table.collection_name(), entities.len());
                }
                BaselineEntry::Document(table, fields) => {
                    println!("{:<18} document, {} field(s)", table.collection_name(), fields.len());
                }
            }
        }
        println!("total: {} entities", dataset.entity_count());
        Ok(())
    }

    fn mode() {
        let config = SyncConfig::from_env();
        match config.validate() {
            Ok(()) => println!("remote ({}), sign-in required", config),
            Err(reason) => {
                println!("local: {}", reason);
                println!("set {} and its access key to enable remote mode", ENV_REMOTE_URL);
            }
        }
    }

    async fn demo(local: bool, take: i64) -> Result<(), Box<dyn Error>> {
        let baseline = BaselineDataset::embedded()?;
        let remote = Arc::new(InMemoryRemoteStore::new());

        let engine = if local {
            SyncEngine::local(baseline)?
        } else {
            let authenticator = PasswordAuthenticator::new().user(DEMO_USER, DEMO_PASSWORD)?;
            SyncEngine::open(
                &SyncConfig::new(DEMO_URL, DEMO_KEY),
                remote.clone(),
                Arc::new(authenticator),
                baseline,
            )?
        };

        let loads = match engine.mode() {
            SyncMode::Local => engine.start().await,
            _ => {
                let report = engine
                    .sign_in(&Credentials::new(DEMO_USER, DEMO_PASSWORD))
                    .await?;
                println!("signed in as {}", report.session.user());
                match &report.seed {
                    Ok(seed) if seed.skipped => println!("seed skipped, remote already populated"),
                    Ok(seed) => println!(
                        "seeded {} table(s), {} failed",
                        seed.seeded.len(),
                        seed.failed.len()
                    ),
                    Err(err) => println!("seed did not run: {}", err),
                }
                report.loads
            }
        };
        Self::print_loads(&loads);

        let products = engine.registry().collection(TableId::Products)?;
        let report = products
            .update("prd-chair", move |chair| {
                let stock = chair.get("stock").and_then(Value::as_i64).unwrap_or(0);
                chair.set("stock", stock - take);
            })
            .await?;
        let stock = Self::stock(&products)?;
        println!(
            "prd-chair stock now {} ({} upserted, {} deleted)",
            stock, report.upserted, report.deleted
        );

        if engine.mode().is_remote() {
            remote.fail_on(RemoteOp::UpsertMany, Some(TableId::Products))?;
            match products.update("prd-chair", |chair| chair.set("stock", 0)).await {
                Ok(_) => println!("unexpected: rejected write was accepted"),
                Err(err) => println!("rejected write rolled back: {}", err),
            }
            remote.clear_failures()?;
            println!("prd-chair stock after rollback {}", Self::stock(&products)?);
        }

        engine.activity().flush().await;
        let stats = engine.activity().stats();
        println!(
            "activity: {} written, {} failed, {} dropped",
            stats.written, stats.failed, stats.dropped
        );
        println!("remote writes: {}", remote.writes()?.len());
        for entry in remote.rows(TableId::ActivityLog)? {
            let entry: ActivityEntry = from_row(entry)?;
            println!("  [{}] {} {}: {}", entry.at, entry.actor, entry.action, entry.detail);
        }

        if engine.mode().is_remote() {
            engine.sign_out()?;
            println!("signed out, mode is now {}", engine.mode());
        }
        Ok(())
    }

    fn stock(products: &CollectionStore<Entity>) -> syncdeck::Result<Value> {
        Ok(products
            .get("prd-chair")?
            .and_then(|chair| chair.get("stock").cloned())
            .unwrap_or(Value::Null))
    }

    fn print_loads(loads: &std::collections::BTreeMap<TableId, LoadOutcome>) {
        for (table, outcome) in loads {
            match outcome {
                LoadOutcome::Baseline(count) => println!("  {:<18} baseline ({})", table, count),
                LoadOutcome::Fetched(count) => println!("  {:<18} fetched ({})", table, count),
                LoadOutcome::Failed(err) => println!("  {:<18} failed: {}", table, err),
                LoadOutcome::Skipped(mode) => println!("  {:<18} skipped ({})", table, mode),
            }
        }
    }
}
