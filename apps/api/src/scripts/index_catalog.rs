//! Embeds a metadata-only catalog file and writes the catalog artifact the
//! API server loads at startup.

use anyhow::{bail, Context, Result};
use assessment_recommender_api::{
    config::Config,
    ml::{Embedder, OpenAiEmbedder},
    models::CatalogItem,
    services::{catalog::normalize_id, Catalog},
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::{collections::HashSet, fs, path::PathBuf};
use tokio::time::{sleep, Duration};

#[derive(Parser, Debug)]
#[command(about = "Embed catalog items and write the searchable catalog")]
struct Args {
    /// JSON array of catalog items without embeddings
    #[arg(long)]
    input: PathBuf,

    /// Output path; defaults to the configured catalog path
    #[arg(long)]
    output: Option<PathBuf>,

    /// Pause between provider calls to stay under rate limits
    #[arg(long, default_value_t = 200)]
    delay_ms: u64,
}

/// Drops items whose normalized url was already seen, keeping the first.
fn dedupe(items: Vec<CatalogItem>) -> Vec<CatalogItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| {
            let key = normalize_id(if item.id.is_empty() { &item.url } else { &item.id });
            let fresh = seen.insert(key);
            if !fresh {
                warn!("Skipping duplicate catalog entry {}", item.url);
            }
            fresh
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "index_catalog=info,assessment_recommender_api=info".into()),
        )
        .init();

    let args = Args::parse();
    let config = Config::load().context("Failed to load configuration")?;
    let output = args.output.unwrap_or_else(|| config.catalog_path.clone());

    let raw = fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let items: Vec<CatalogItem> =
        serde_json::from_str(&raw).context("Failed to parse catalog items")?;
    let mut items = dedupe(items);
    info!("Embedding {} catalog items", items.len());

    let embedder = OpenAiEmbedder::new(&config.embedding)?;
    info!("Using {}", embedder.model_info());

    let progress = ProgressBar::new(items.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner} [{bar:40}] {pos}/{len} {msg}")
            .progress_chars("=> "),
    );

    let mut failed = Vec::new();
    let total = items.len();
    for (index, item) in items.iter_mut().enumerate() {
        progress.set_message(item.name.clone());
        match embedder.embed(&item.searchable_text()).await {
            Ok(embedding) => item.embedding = embedding,
            Err(e) => {
                error!("Failed to embed {}: {}", item.url, e);
                failed.push(item.url.clone());
            }
        }
        progress.inc(1);

        if index + 1 < total {
            sleep(Duration::from_millis(args.delay_ms)).await;
        }
    }
    progress.finish_with_message("done");

    if !failed.is_empty() {
        bail!(
            "{} items could not be embedded, catalog not written: {:?}",
            failed.len(),
            failed
        );
    }

    let catalog = Catalog::from_items(items)?;
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&output, serde_json::to_string_pretty(catalog.items())?)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!(
        "Wrote {} items with dimension {} to {}",
        catalog.len(),
        catalog.dimension(),
        output.display()
    );
    Ok(())
}
