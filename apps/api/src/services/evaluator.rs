use crate::{
    error::{ApiError, Result},
    models::CatalogItem,
    services::{catalog::normalize_id, RecommendationService},
};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, io, path::Path};
use tracing::{info, warn};

/// A labeled query and the ids of the assessments judged relevant for it.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationCase {
    pub query: String,
    pub ground_truth: Vec<String>,
}

impl EvaluationCase {
    pub fn new(query: impl Into<String>, ground_truth: Vec<String>) -> Result<Self> {
        let query = query.into();
        if query.trim().is_empty() {
            return Err(ApiError::InvalidInput(
                "evaluation case has an empty query".to_string(),
            ));
        }
        if ground_truth.is_empty() {
            return Err(ApiError::InvalidInput(format!(
                "evaluation case '{}' has no ground truth",
                query
            )));
        }
        Ok(Self {
            query,
            ground_truth,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseResult {
    pub query: String,
    pub recall: f64,
    pub predicted: usize,
    pub relevant: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub per_case: Vec<CaseResult>,
    pub mean_recall: f64,
}

/// One row of the labeled and submission CSV files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryUrlRow {
    #[serde(rename = "Query")]
    pub query: String,
    #[serde(rename = "Assessment_url")]
    pub assessment_url: String,
}

/// `|P ∩ G| / |G|` over normalized ids.
pub fn recall(predicted: &[String], ground_truth: &[String]) -> f64 {
    let truth: HashSet<String> = ground_truth.iter().map(|id| normalize_id(id)).collect();
    if truth.is_empty() {
        return 0.0;
    }
    let predicted: HashSet<String> = predicted.iter().map(|id| normalize_id(id)).collect();
    let hits = truth.intersection(&predicted).count();
    hits as f64 / truth.len() as f64
}

/// Unweighted mean; zero for no cases.
pub fn mean_recall(per_case: &[CaseResult]) -> f64 {
    if per_case.is_empty() {
        return 0.0;
    }
    per_case.iter().map(|c| c.recall).sum::<f64>() / per_case.len() as f64
}

/// Groups `Query,Assessment_url` rows by query, keeping first-appearance
/// order of queries.
pub fn group_cases(rows: Vec<QueryUrlRow>) -> Result<Vec<EvaluationCase>> {
    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();

    for row in rows {
        let query = row.query.trim().to_string();
        let url = row.assessment_url.trim().to_string();
        if query.is_empty() || url.is_empty() {
            continue;
        }
        match grouped.iter_mut().find(|(q, _)| *q == query) {
            Some((_, urls)) => urls.push(url),
            None => grouped.push((query, vec![url])),
        }
    }

    grouped
        .into_iter()
        .map(|(query, urls)| EvaluationCase::new(query, urls))
        .collect()
}

pub fn load_cases(path: &Path) -> Result<Vec<EvaluationCase>> {
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader
        .deserialize::<QueryUrlRow>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    group_cases(rows)
}

/// Reads the unique, non-empty values of the `Query` column.
pub fn load_queries(path: &Path) -> Result<Vec<String>> {
    #[derive(Deserialize)]
    struct QueryRow {
        #[serde(rename = "Query")]
        query: String,
    }

    let mut reader = csv::Reader::from_path(path)?;
    let mut seen = HashSet::new();
    let mut queries = Vec::new();
    for row in reader.deserialize::<QueryRow>() {
        let query = row?.query.trim().to_string();
        if !query.is_empty() && seen.insert(query.clone()) {
            queries.push(query);
        }
    }
    Ok(queries)
}

pub fn write_submission<W: io::Write>(writer: W, rows: &[QueryUrlRow]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    if rows.is_empty() {
        writer.write_record(["Query", "Assessment_url"])?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Runs the recommendation service over labeled queries and scores it.
pub struct Evaluator<'a> {
    service: &'a RecommendationService,
}

impl<'a> Evaluator<'a> {
    pub fn new(service: &'a RecommendationService) -> Self {
        Self { service }
    }

    /// Catalog items recommended for a query, in rank order. Provider
    /// outages come back as an empty list; a missing catalog or a blank
    /// query is an error for the whole run.
    async fn predict(&self, query: &str) -> Result<Vec<CatalogItem>> {
        let scored = self.service.recommend_scored(query).await?;
        Ok(scored.into_iter().map(|(item, _)| item).collect())
    }

    pub async fn evaluate_case(&self, case: &EvaluationCase) -> Result<CaseResult> {
        let predicted: Vec<String> = self
            .predict(&case.query)
            .await?
            .into_iter()
            .map(|item| item.id)
            .collect();
        let recall = recall(&predicted, &case.ground_truth);
        info!(
            "Recall@10 {:.2} ({} predicted, {} ground truth) for '{}'",
            recall,
            predicted.len(),
            case.ground_truth.len(),
            case.query
        );
        Ok(CaseResult {
            query: case.query.clone(),
            recall,
            predicted: predicted.len(),
            relevant: case.ground_truth.len(),
        })
    }

    pub async fn evaluate(&self, cases: &[EvaluationCase]) -> Result<EvaluationReport> {
        let mut per_case = Vec::with_capacity(cases.len());
        for case in cases {
            per_case.push(self.evaluate_case(case).await?);
        }
        let mean_recall = mean_recall(&per_case);
        info!("Mean Recall@10 = {:.4} over {} queries", mean_recall, per_case.len());
        Ok(EvaluationReport {
            per_case,
            mean_recall,
        })
    }

    /// One row per (query, predicted url) pair, in rank order.
    pub async fn submission_rows(&self, queries: &[String]) -> Result<Vec<QueryUrlRow>> {
        let mut rows = Vec::new();
        for query in queries {
            let predicted = self.predict(query).await?;
            if predicted.is_empty() {
                warn!("No recommendations for '{}'", query);
            }
            rows.extend(predicted.into_iter().map(|item| QueryUrlRow {
                query: query.clone(),
                assessment_url: item.url,
            }));
        }
        Ok(rows)
    }
}
