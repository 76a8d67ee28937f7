//! Adzuna REST API adapter.

use async_trait::async_trait;
use chrono::Utc;
use jobmesh_core::{Job, JobSearchQuery, JobSource, JobType};
use jobmesh_net::{HttpClientConfig, HttpFetcher, RateLimitConfig, RateLimiter, RetryPolicy};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::normalize::{normalize_record, RawJobRecord};
use crate::{AdapterError, SourceAdapter, SourceSettings};

const ADZUNA_API_BASE: &str = "https://api.adzuna.com/v1/api/jobs";
const ADZUNA_RESULTS_CAP: u32 = 50;

#[derive(Debug, Clone)]
pub struct AdzunaCredentials {
    pub app_id: String,
    pub app_key: String,
}

impl AdzunaCredentials {
    pub fn from_env() -> Option<Self> {
        let app_id = std::env::var("ADZUNA_APP_ID").ok()?;
        let app_key = std::env::var("ADZUNA_APP_KEY").ok()?;
        if app_id.trim().is_empty() || app_key.trim().is_empty() {
            return None;
        }
        Some(Self { app_id, app_key })
    }

    pub fn from_settings_or_env(settings: &SourceSettings) -> Option<Self> {
        match (&settings.app_id, &settings.app_key) {
            (Some(app_id), Some(app_key))
                if !app_id.trim().is_empty() && !app_key.trim().is_empty() =>
            {
                Some(Self {
                    app_id: app_id.clone(),
                    app_key: app_key.clone(),
                })
            }
            _ => Self::from_env(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AdzunaSearchResponse {
    #[serde(default)]
    results: Vec<Value>,
}

pub struct AdzunaAdapter {
    credentials: Option<AdzunaCredentials>,
    country: String,
    http: HttpFetcher,
    limiter: RateLimiter,
    retry: RetryPolicy,
}

impl AdzunaAdapter {
    /// Missing credentials are not an error; the adapter degrades to empty
    /// results so multi-source aggregation keeps working.
    pub fn new(
        credentials: Option<AdzunaCredentials>,
        limit: RateLimitConfig,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            credentials,
            country: "us".to_string(),
            http: HttpFetcher::new(HttpClientConfig::default())?,
            limiter: RateLimiter::new(limit),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }

    fn search_request(
        &self,
        credentials: &AdzunaCredentials,
        query: &JobSearchQuery,
    ) -> (String, Vec<(&'static str, String)>) {
        let url = format!("{ADZUNA_API_BASE}/{}/search/{}", self.country, query.page);
        let mut params: Vec<(&'static str, String)> = vec![
            ("app_id", credentials.app_id.clone()),
            ("app_key", credentials.app_key.clone()),
            (
                "results_per_page",
                query.limit.min(ADZUNA_RESULTS_CAP).to_string(),
            ),
            ("content-type", "application/json".to_string()),
        ];
        if let Some(keywords) = query.keywords.as_deref().filter(|s| !s.trim().is_empty()) {
            params.push(("what", keywords.to_string()));
        }
        if let Some(location) = query.location.as_deref().filter(|s| !s.trim().is_empty()) {
            params.push(("where", location.to_string()));
        }
        if let Some(min) = query.salary_min {
            params.push(("salary_min", min.to_string()));
        }
        if let Some(max) = query.salary_max {
            params.push(("salary_max", max.to_string()));
        }
        if let Some(recency) = query.posted_within {
            params.push(("max_days_old", recency.days().to_string()));
        }
        for job_type in &query.job_types {
            match job_type {
                JobType::FullTime => params.push(("full_time", "1".to_string())),
                JobType::PartTime => params.push(("part_time", "1".to_string())),
                JobType::Contract => params.push(("contract", "1".to_string())),
                // Adzuna has no internship flag; the inference heuristics
                // still classify matching titles downstream.
                JobType::Internship => {}
            }
        }
        (url, params)
    }

    async fn fetch_page(
        &self,
        credentials: &AdzunaCredentials,
        query: &JobSearchQuery,
    ) -> Result<AdzunaSearchResponse, AdapterError> {
        if !self.limiter.try_acquire(None) {
            return Err(AdapterError::RateLimited {
                board: JobSource::Adzuna,
            });
        }
        let (url, params) = self.search_request(credentials, query);
        let response = self
            .retry
            .run(|| self.http.get_json_with_params::<AdzunaSearchResponse>(&url, &params))
            .await?;
        Ok(response)
    }
}

#[async_trait]
impl SourceAdapter for AdzunaAdapter {
    fn source(&self) -> JobSource {
        JobSource::Adzuna
    }

    async fn search(&self, query: &JobSearchQuery) -> Result<Vec<Job>, AdapterError> {
        let Some(credentials) = &self.credentials else {
            warn!("adzuna credentials missing; returning no results");
            return Ok(Vec::new());
        };
        let query = query.normalized();
        let response = self.fetch_page(credentials, &query).await?;

        let now = Utc::now();
        let mut jobs = Vec::with_capacity(response.results.len());
        for value in &response.results {
            let Some(raw) = record_from_result(value) else {
                debug!("skipping adzuna result without an id");
                continue;
            };
            match normalize_record(JobSource::Adzuna, &raw, now) {
                Ok(job) => jobs.push(job),
                Err(err) => debug!(%err, "skipping malformed adzuna record"),
            }
        }
        Ok(jobs)
    }

    async fn get_job_details(&self, external_id: &str) -> Result<Option<Job>, AdapterError> {
        let Some(credentials) = &self.credentials else {
            warn!("adzuna credentials missing; job detail unavailable");
            return Ok(None);
        };
        // Adzuna exposes no fetch-by-id endpoint in this API family, so the
        // detail view is reconstructed from a first-page scan.
        let query = JobSearchQuery {
            limit: ADZUNA_RESULTS_CAP,
            ..JobSearchQuery::default()
        };
        let response = self.fetch_page(credentials, &query).await?;
        let now = Utc::now();
        for value in &response.results {
            let Some(raw) = record_from_result(value) else {
                continue;
            };
            if raw.external_id == external_id {
                return match normalize_record(JobSource::Adzuna, &raw, now) {
                    Ok(job) => Ok(Some(job)),
                    Err(err) => {
                        debug!(%err, "adzuna detail record failed normalization");
                        Ok(None)
                    }
                };
            }
        }
        Ok(None)
    }
}

/// Map one Adzuna result object onto the shared raw-record shape. Returns
/// `None` when the record lacks an id, which skips it individually.
fn record_from_result(value: &Value) -> Option<RawJobRecord> {
    let external_id = match value.get("id") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return None,
    };

    let mut salary = Map::new();
    if let Some(min) = value.get("salary_min").filter(|v| v.is_number()) {
        salary.insert("min".to_string(), min.clone());
    }
    if let Some(max) = value.get("salary_max").filter(|v| v.is_number()) {
        salary.insert("max".to_string(), max.clone());
    }
    let salary = if salary.is_empty() {
        Value::Null
    } else {
        Value::Object(salary)
    };

    // contract_time/contract_type arrive as "full_time"/"part_time" etc.;
    // underscores are folded to spaces so the shared inference sees them.
    let job_type_hint = [str_at(value, &["contract_time"]), str_at(value, &["contract_type"])]
        .into_iter()
        .flatten()
        .map(|hint| hint.replace('_', " "))
        .collect::<Vec<_>>()
        .join(" ");

    Some(RawJobRecord {
        external_id,
        title: str_at(value, &["title"]),
        company: str_at(value, &["company", "display_name"]),
        location: str_at(value, &["location", "display_name"]),
        description: str_at(value, &["description"]),
        salary,
        job_type_hint: (!job_type_hint.is_empty()).then_some(job_type_hint),
        posted_at: str_at(value, &["created"]),
        apply_url: str_at(value, &["redirect_url"]),
        requirements: Value::Null,
        responsibilities: Value::Null,
        benefits: Value::Null,
    })
}

fn str_at(value: &Value, path: &[&str]) -> Option<String> {
    let mut cur = value;
    for segment in path {
        cur = cur.get(*segment)?;
    }
    cur.as_str().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobmesh_core::{JobType, RemoteType};
    use serde_json::json;

    fn sample_result() -> Value {
        json!({
            "id": "4412233",
            "title": "Senior Backend Engineer (Remote)",
            "company": {"display_name": "Acme"},
            "location": {"display_name": "Boston, MA"},
            "description": "<p>Build services. Requirements: 5+ years of Rust.</p>",
            "salary_min": 140000.0,
            "salary_max": 180000.0,
            "contract_time": "full_time",
            "created": "2026-03-01T08:00:00Z",
            "redirect_url": "https://www.adzuna.com/land/ad/4412233"
        })
    }

    #[test]
    fn result_maps_onto_canonical_job() {
        let raw = record_from_result(&sample_result()).unwrap();
        let job = normalize_record(JobSource::Adzuna, &raw, Utc::now()).unwrap();
        assert_eq!(job.external_id, "4412233");
        assert_eq!(job.company, "Acme");
        assert_eq!(job.salary_min, Some(140_000));
        assert_eq!(job.salary_max, Some(180_000));
        assert_eq!(job.remote_type, Some(RemoteType::Remote));
        assert_eq!(job.job_type, Some(JobType::FullTime));
        assert_eq!(job.description, "Build services. Requirements: 5+ years of Rust.");
        assert_eq!(job.apply_url, "https://www.adzuna.com/land/ad/4412233");
        assert!(!job.requirements.is_empty());
    }

    #[test]
    fn part_time_contract_hint_survives_underscore_folding() {
        let mut value = sample_result();
        value["title"] = json!("Office Assistant");
        value["contract_time"] = json!("part_time");
        let raw = record_from_result(&value).unwrap();
        let job = normalize_record(JobSource::Adzuna, &raw, Utc::now()).unwrap();
        assert_eq!(job.job_type, Some(JobType::PartTime));
    }

    #[test]
    fn numeric_ids_and_missing_ids_are_handled() {
        let mut value = sample_result();
        value["id"] = json!(987654);
        assert_eq!(record_from_result(&value).unwrap().external_id, "987654");

        let mut value = sample_result();
        value.as_object_mut().unwrap().remove("id");
        assert!(record_from_result(&value).is_none());
    }

    #[tokio::test]
    async fn unconfigured_adapter_degrades_to_empty_results() {
        let adapter = AdzunaAdapter::new(None, RateLimitConfig::default()).unwrap();
        let jobs = adapter.search(&JobSearchQuery::default()).await.unwrap();
        assert!(jobs.is_empty());
        let detail = adapter.get_job_details("4412233").await.unwrap();
        assert!(detail.is_none());
    }

    #[test]
    fn search_request_carries_filters() {
        let adapter = AdzunaAdapter::new(None, RateLimitConfig::default()).unwrap();
        let credentials = AdzunaCredentials {
            app_id: "id".to_string(),
            app_key: "key".to_string(),
        };
        let query = JobSearchQuery {
            keywords: Some("rust engineer".to_string()),
            location: Some("Boston".to_string()),
            salary_min: Some(120_000),
            posted_within: Some(jobmesh_core::PostedWithin::PastWeek),
            job_types: vec![JobType::FullTime],
            page: 2,
            limit: 500,
            ..JobSearchQuery::default()
        };
        let (url, params) = adapter.search_request(&credentials, &query);
        assert!(url.ends_with("/us/search/2"));
        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.clone())
        };
        assert_eq!(get("what").as_deref(), Some("rust engineer"));
        assert_eq!(get("where").as_deref(), Some("Boston"));
        assert_eq!(get("salary_min").as_deref(), Some("120000"));
        assert_eq!(get("max_days_old").as_deref(), Some("7"));
        assert_eq!(get("full_time").as_deref(), Some("1"));
        // source cap applies to oversized limits
        assert_eq!(get("results_per_page").as_deref(), Some("50"));
    }
}
