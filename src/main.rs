use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use denormsync::{
    BackfillCursor, DenormConfig, Denormalizer, DispatchOutcome, InMemoryDocumentStore,
    LocalBackfillRunner, RecordingStateSink, resolve_target_field_path,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "denormsync")]
#[command(about = "Denormalized field propagation and resync tooling")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load the configuration from the environment and validate it
    CheckConfig,
    /// Split a target field path template into parent path and link field
    ResolvePath { path: String },
    /// Propagate one source document of a JSON fixture
    Propagate {
        #[arg(long)]
        fixture: PathBuf,
        #[arg(long)]
        doc: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Resync every source document of a JSON fixture
    Backfill {
        #[arg(long)]
        fixture: PathBuf,
        /// Resume from a task payload, e.g. '{"startAfterDocId":"u9","sourceDocs":10}'
        #[arg(long)]
        cursor: Option<String>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::CheckConfig => check_config(),
        Command::ResolvePath { path } => {
            let (parent, leaf) = resolve_target_field_path(&path)?;
            println!("parent: {}\nlink field: {}", parent, leaf);
            Ok(())
        }
        Command::Propagate { fixture, doc, out } => {
            propagate(&fixture, &doc, out.as_deref()).await
        }
        Command::Backfill {
            fixture,
            cursor,
            out,
        } => backfill(&fixture, cursor.as_deref(), out.as_deref()).await,
    }
}

fn load_config() -> Result<DenormConfig> {
    let config = DenormConfig::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn check_config() -> Result<()> {
    let config = load_config()?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

async fn open_fixture(path: &Path) -> Result<Arc<InMemoryDocumentStore>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read fixture '{}'", path.display()))?;
    let fixture = serde_json::from_str(&raw)
        .with_context(|| format!("Fixture '{}' is not valid JSON", path.display()))?;

    let store = Arc::new(InMemoryDocumentStore::new());
    let count = store.load_json(fixture).await?;
    tracing::info!(documents = count, "fixture loaded");
    Ok(store)
}

async fn write_store(store: &InMemoryDocumentStore, out: Option<&Path>) -> Result<()> {
    let Some(out) = out else {
        return Ok(());
    };
    let dump = serde_json::to_string_pretty(&store.dump().await)?;
    fs::write(out, dump).with_context(|| format!("Failed to write '{}'", out.display()))?;
    Ok(())
}

async fn propagate(fixture: &Path, doc: &str, out: Option<&Path>) -> Result<()> {
    let config = load_config()?;
    let store = open_fixture(fixture).await?;
    let source = store
        .document(doc)
        .await
        .ok_or_else(|| anyhow!("Document '{}' not found in fixture", doc))?;

    let denormalizer = Denormalizer::new(config, store.clone())?;
    let updated = denormalizer.propagate(&source).await?;
    println!("{} target documents updated", updated);

    write_store(&store, out).await
}

async fn backfill(fixture: &Path, cursor: Option<&str>, out: Option<&Path>) -> Result<()> {
    let config = load_config()?.do_backfill(true);
    let store = open_fixture(fixture).await?;

    let payload = match cursor {
        Some(raw) => serde_json::from_str(raw).context("Cursor is not valid JSON")?,
        None => serde_json::Value::Null,
    };
    let cursor = BackfillCursor::from_payload(payload).context("Invalid backfill cursor")?;

    let denormalizer = Arc::new(Denormalizer::new(config, store.clone())?);
    let runtime = Arc::new(RecordingStateSink::new());
    let runner = LocalBackfillRunner::new(denormalizer, runtime.clone());

    match runner.run(cursor).await? {
        DispatchOutcome::Completed {
            source_docs,
            target_docs,
        } => println!(
            "Read {} source documents, updated {} target documents",
            source_docs, target_docs
        ),
        other => println!("Backfill stopped: {:?}", other),
    }
    if let Some((state, message)) = runtime.last().await {
        println!("{:?}: {}", state, message);
    }

    write_store(&store, out).await
}
