//! Deterministic placeholder adapters for boards without usable public
//! APIs. Listings are synthesized from the query's own keywords and
//! location so the aggregator's merge/dedup path is exercisable offline,
//! and every record still flows through the shared normalization.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jobmesh_core::{Job, JobSearchQuery, JobSource, JobType, RemoteType};
use jobmesh_net::{FetchError, RateLimitConfig, RateLimiter, RetryPolicy};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::normalize::{normalize_record, RawJobRecord};
use crate::{AdapterError, SourceAdapter};

/// Static shape of one synthesized board.
#[derive(Debug, Clone, Copy)]
struct BoardProfile {
    source: JobSource,
    companies: &'static [&'static str],
    salary_bands: &'static [&'static str],
    results_cap: u32,
}

// The first company is shared across boards so a cross-posted listing shows
// up on every synthetic source and exercises cross-source dedup.
const LINKEDIN_PROFILE: BoardProfile = BoardProfile {
    source: JobSource::LinkedIn,
    companies: &["Acme Corp", "Meridian Labs", "Northwind Analytics"],
    salary_bands: &[
        "$90,000 - $120,000 a year",
        "$110,000 - $145,000 a year",
        "$70,000 - $95,000 a year",
    ],
    results_cap: 25,
};

const INDEED_PROFILE: BoardProfile = BoardProfile {
    source: JobSource::Indeed,
    companies: &["Acme Corp", "Harbor Systems", "Bluegrass Software"],
    salary_bands: &[
        "$85,000 - $115,000 a year",
        "$100,000 - $130,000 a year",
        "$60,000 - $80,000 a year",
    ],
    results_cap: 25,
};

const GLASSDOOR_PROFILE: BoardProfile = BoardProfile {
    source: JobSource::Glassdoor,
    companies: &["Acme Corp", "Summit Digital", "Copperline Media"],
    salary_bands: &[
        "$95,000 - $125,000 a year",
        "$80,000 - $105,000 a year",
        "$105,000 - $140,000 a year",
    ],
    results_cap: 20,
};

pub struct SyntheticBoardAdapter {
    profile: BoardProfile,
    limiter: RateLimiter,
    retry: RetryPolicy,
}

pub fn linkedin_adapter(limit: RateLimitConfig) -> SyntheticBoardAdapter {
    SyntheticBoardAdapter::new(LINKEDIN_PROFILE, limit)
}

pub fn indeed_adapter(limit: RateLimitConfig) -> SyntheticBoardAdapter {
    SyntheticBoardAdapter::new(INDEED_PROFILE, limit)
}

pub fn glassdoor_adapter(limit: RateLimitConfig) -> SyntheticBoardAdapter {
    SyntheticBoardAdapter::new(GLASSDOOR_PROFILE, limit)
}

impl SyntheticBoardAdapter {
    fn new(profile: BoardProfile, limit: RateLimitConfig) -> Self {
        Self {
            profile,
            limiter: RateLimiter::new(limit),
            retry: RetryPolicy::default(),
        }
    }

    fn listing_count(&self, query: &JobSearchQuery) -> usize {
        query.limit.min(self.profile.results_cap).clamp(1, 4) as usize
    }

    fn external_id(&self, keywords: &str, location: &str, index: usize) -> String {
        let seed = format!(
            "{}:{}:{}:{}",
            self.profile.source.as_str(),
            keywords.to_lowercase(),
            location.to_lowercase(),
            index
        );
        Uuid::new_v5(&Uuid::NAMESPACE_URL, seed.as_bytes())
            .simple()
            .to_string()
    }

    fn job_type_hint(&self, query: &JobSearchQuery, index: usize) -> &'static str {
        // The board is assumed to honor a requested type filter server-side.
        let requested = query.job_types.first().copied();
        match requested.unwrap_or(match index % 4 {
            1 => JobType::Contract,
            2 => JobType::PartTime,
            3 => JobType::Internship,
            _ => JobType::FullTime,
        }) {
            JobType::FullTime => "full-time",
            JobType::PartTime => "part-time",
            JobType::Contract => "contract",
            JobType::Internship => "internship",
        }
    }

    fn synthesize_listings(&self, query: &JobSearchQuery, now: DateTime<Utc>) -> Vec<RawJobRecord> {
        let keywords = query
            .keywords
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("Software Engineer");
        let location = query
            .location
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| {
                if query.remote_types.contains(&RemoteType::Remote) || query.remote_types.is_empty()
                {
                    "Remote"
                } else {
                    "New York, NY"
                }
            });
        let max_age_hours = query.posted_within.map(|p| p.days() * 24).unwrap_or(30 * 24);

        (0..self.listing_count(query))
            .map(|i| {
                let company = self.profile.companies[i % self.profile.companies.len()];
                let title = title_case(keywords);
                let hint = self.job_type_hint(query, i);
                let description = format!(
                    "<p>{company} is hiring a {title} based in {location}.</p>\
                     <p>Requirements: {}+ years of experience with {keywords}. \
                     You will collaborate with a distributed team and ship weekly.</p>",
                    2 + i
                );
                let posted_offset = Duration::hours((i as i64 * 18) % max_age_hours.max(1));
                RawJobRecord {
                    external_id: self.external_id(keywords, location, i),
                    title: Some(title),
                    company: Some(company.to_string()),
                    location: Some(location.to_string()),
                    description: Some(description),
                    salary: Value::String(
                        self.profile.salary_bands[i % self.profile.salary_bands.len()].to_string(),
                    ),
                    job_type_hint: Some(hint.to_string()),
                    posted_at: Some((now - posted_offset).to_rfc3339()),
                    // Left empty on purpose so the source-constructed apply
                    // URL fallback stays covered.
                    apply_url: None,
                    requirements: Value::Null,
                    responsibilities: Value::String(
                        "Design services; Review code; Own production health".to_string(),
                    ),
                    benefits: Value::String("Health insurance, 401k matching, PTO".to_string()),
                }
            })
            .collect()
    }

    fn reconstruct(&self, external_id: &str, now: DateTime<Utc>) -> RawJobRecord {
        let seed = external_id
            .bytes()
            .fold(0usize, |acc, b| acc.wrapping_add(b as usize));
        let company = self.profile.companies[seed % self.profile.companies.len()];
        RawJobRecord {
            external_id: external_id.to_string(),
            title: Some("Software Engineer".to_string()),
            company: Some(company.to_string()),
            location: Some("Remote".to_string()),
            description: Some(format!(
                "<p>{company} role reconstructed from listing {external_id}.</p>\
                 <p>Requirements: 3+ years of relevant experience.</p>"
            )),
            salary: Value::String(
                self.profile.salary_bands[seed % self.profile.salary_bands.len()].to_string(),
            ),
            job_type_hint: Some("full-time".to_string()),
            posted_at: Some((now - Duration::days(1)).to_rfc3339()),
            apply_url: None,
            requirements: Value::Null,
            responsibilities: Value::Null,
            benefits: Value::Null,
        }
    }
}

#[async_trait]
impl SourceAdapter for SyntheticBoardAdapter {
    fn source(&self) -> JobSource {
        self.profile.source
    }

    async fn search(&self, query: &JobSearchQuery) -> Result<Vec<Job>, AdapterError> {
        if !self.limiter.try_acquire(None) {
            return Err(AdapterError::RateLimited {
                board: self.source(),
            });
        }
        let query = query.normalized();
        let raw = self
            .retry
            .run(|| async { Ok::<_, FetchError>(self.synthesize_listings(&query, Utc::now())) })
            .await?;

        let now = Utc::now();
        let mut jobs = Vec::with_capacity(raw.len());
        for record in &raw {
            match normalize_record(self.source(), record, now) {
                Ok(job) => jobs.push(job),
                Err(err) => {
                    debug!(source = %self.source(), %err, "skipping malformed record");
                }
            }
        }
        Ok(jobs)
    }

    async fn get_job_details(&self, external_id: &str) -> Result<Option<Job>, AdapterError> {
        if external_id.trim().is_empty() {
            return Ok(None);
        }
        if !self.limiter.try_acquire(None) {
            return Err(AdapterError::RateLimited {
                board: self.source(),
            });
        }
        let raw = self
            .retry
            .run(|| async { Ok::<_, FetchError>(self.reconstruct(external_id, Utc::now())) })
            .await?;
        match normalize_record(self.source(), &raw, Utc::now()) {
            Ok(job) => Ok(Some(job)),
            Err(err) => {
                debug!(source = %self.source(), %err, "detail record failed normalization");
                Ok(None)
            }
        }
    }
}

fn title_case(input: &str) -> String {
    input
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    let mut s = String::new();
                    s.extend(first.to_uppercase());
                    s.push_str(chars.as_str());
                    s
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(keywords: &str, location: &str) -> JobSearchQuery {
        JobSearchQuery {
            keywords: Some(keywords.to_string()),
            location: Some(location.to_string()),
            ..JobSearchQuery::default()
        }
    }

    #[tokio::test]
    async fn search_is_deterministic_for_a_fixed_query() {
        let adapter = linkedin_adapter(RateLimitConfig::default());
        let q = query("rust engineer", "Berlin");
        let first = adapter.search(&q).await.unwrap();
        let second = adapter.search(&q).await.unwrap();
        assert!(!first.is_empty());
        let ids = |jobs: &[Job]| jobs.iter().map(|j| j.external_id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
        let titles = |jobs: &[Job]| jobs.iter().map(|j| j.title.clone()).collect::<Vec<_>>();
        assert_eq!(titles(&first), titles(&second));
    }

    #[tokio::test]
    async fn listings_reflect_query_keywords_and_location() {
        let adapter = indeed_adapter(RateLimitConfig::default());
        let jobs = adapter.search(&query("data scientist", "Austin, TX")).await.unwrap();
        assert!(jobs.iter().all(|j| j.title.contains("Data Scientist")));
        assert!(jobs.iter().all(|j| j.location == "Austin, TX"));
        assert!(jobs.iter().all(|j| j.salary_min.is_some() && j.salary_max.is_some()));
        assert!(jobs.iter().all(|j| !j.requirements.is_empty()));
    }

    #[tokio::test]
    async fn apply_url_falls_back_to_source_constructed_link() {
        let adapter = glassdoor_adapter(RateLimitConfig::default());
        let jobs = adapter.search(&query("qa analyst", "Denver")).await.unwrap();
        for job in jobs {
            assert!(job.apply_url.contains("glassdoor.com"));
            assert!(job.apply_url.contains(&job.external_id));
        }
    }

    #[tokio::test]
    async fn job_type_filter_biases_synthesized_hints() {
        let adapter = linkedin_adapter(RateLimitConfig::default());
        let q = JobSearchQuery {
            keywords: Some("ops".to_string()),
            job_types: vec![JobType::Contract],
            ..JobSearchQuery::default()
        };
        let jobs = adapter.search(&q).await.unwrap();
        assert!(jobs.iter().all(|j| j.job_type == Some(JobType::Contract)));
    }

    #[tokio::test]
    async fn exhausted_budget_fails_fast_with_rate_limit_error() {
        let adapter = indeed_adapter(RateLimitConfig {
            requests_per_minute: 1,
            requests_per_day: 1000,
        });
        let q = query("rust", "Remote");
        assert!(adapter.search(&q).await.is_ok());
        match adapter.search(&q).await {
            Err(AdapterError::RateLimited { board: source }) => assert_eq!(source, JobSource::Indeed),
            other => panic!("expected rate limit error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn details_reconstruct_deterministically() {
        let adapter = glassdoor_adapter(RateLimitConfig::default());
        let a = adapter.get_job_details("abc123").await.unwrap().unwrap();
        let b = adapter.get_job_details("abc123").await.unwrap().unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.company, b.company);
        assert_eq!(a.external_id, "abc123");
        assert!(adapter.get_job_details("  ").await.unwrap().is_none());
    }
}
