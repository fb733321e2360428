//! Scores the recommender against a labeled query set and optionally writes
//! predictions for an unlabeled one.

use anyhow::{Context, Result};
use assessment_recommender_api::{
    app::Application,
    config::Config,
    services::{
        evaluator::{self, mean_recall},
        Evaluator,
    },
};
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::{fs::File, path::PathBuf};

#[derive(Parser, Debug)]
#[command(about = "Compute Mean Recall@10 and generate submission CSVs")]
struct Args {
    /// Labeled CSV with `Query,Assessment_url` rows
    #[arg(long)]
    labeled: Option<PathBuf>,

    /// CSV with a `Query` column to generate predictions for
    #[arg(long)]
    unlabeled: Option<PathBuf>,

    /// Where the submission CSV is written
    #[arg(long, default_value = "predictions.csv")]
    output: PathBuf,

    /// Catalog artifact; defaults to the configured catalog path
    #[arg(long, env = "APP_CATALOG_PATH")]
    catalog: Option<PathBuf>,
}

fn progress_bar(len: usize) -> ProgressBar {
    let progress = ProgressBar::new(len as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner} [{bar:40}] {pos}/{len} {msg}")
            .progress_chars("=> "),
    );
    progress
}

fn preview(query: &str) -> String {
    query.chars().take(50).collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "evaluate=info,assessment_recommender_api=warn".into()),
        )
        .init();

    let args = Args::parse();
    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(catalog) = args.catalog {
        config.catalog_path = catalog;
    }

    let service = Application::new(&config)
        .build_service()
        .context("Failed to build recommendation service")?;
    let evaluator = Evaluator::new(&service);

    if let Some(labeled) = &args.labeled {
        let cases = evaluator::load_cases(labeled)
            .with_context(|| format!("Failed to load {}", labeled.display()))?;
        info!("Found {} unique queries in the labeled set", cases.len());

        let progress = progress_bar(cases.len());
        let mut per_case = Vec::with_capacity(cases.len());
        for case in &cases {
            progress.set_message(preview(&case.query));
            let result = evaluator.evaluate_case(case).await?;
            progress.println(format!(
                "Recall@10 {:.2} ({} predicted, {} relevant) {}",
                result.recall,
                result.predicted,
                result.relevant,
                preview(&result.query)
            ));
            per_case.push(result);
            progress.inc(1);
        }
        progress.finish_and_clear();

        if per_case.is_empty() {
            warn!("No labeled queries found, nothing to score");
        } else {
            println!(
                "{} Mean Recall@10 = {:.4}",
                style("FINAL SCORE:").bold().green(),
                mean_recall(&per_case)
            );
        }
    }

    if let Some(unlabeled) = &args.unlabeled {
        let queries = evaluator::load_queries(unlabeled)
            .with_context(|| format!("Failed to load {}", unlabeled.display()))?;
        info!("Generating predictions for {} queries", queries.len());

        let rows = evaluator.submission_rows(&queries).await?;
        let file = File::create(&args.output)
            .with_context(|| format!("Failed to create {}", args.output.display()))?;
        evaluator::write_submission(file, &rows)?;

        println!(
            "{} {} rows written to {}",
            style("SUBMISSION:").bold().cyan(),
            rows.len(),
            args.output.display()
        );
    }

    Ok(())
}
