//! Canonical job domain model shared across the jobmesh crates.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CRATE_NAME: &str = "jobmesh-core";

/// Placeholder for a missing title or location. Canonical jobs never carry
/// empty display strings.
pub const PLACEHOLDER_TITLE: &str = "Not specified";
pub const PLACEHOLDER_COMPANY: &str = "Company Not Listed";
pub const PLACEHOLDER_LOCATION: &str = "Not specified";

/// Fixed set of job boards the aggregation core knows how to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobSource {
    LinkedIn,
    Indeed,
    Glassdoor,
    Adzuna,
}

impl JobSource {
    pub const ALL: [JobSource; 4] = [
        JobSource::LinkedIn,
        JobSource::Indeed,
        JobSource::Glassdoor,
        JobSource::Adzuna,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobSource::LinkedIn => "linkedin",
            JobSource::Indeed => "indeed",
            JobSource::Glassdoor => "glassdoor",
            JobSource::Adzuna => "adzuna",
        }
    }
}

impl fmt::Display for JobSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linkedin" => Ok(JobSource::LinkedIn),
            "indeed" => Ok(JobSource::Indeed),
            "glassdoor" => Ok(JobSource::Glassdoor),
            "adzuna" => Ok(JobSource::Adzuna),
            other => Err(format!("unknown job source `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteType {
    Remote,
    Hybrid,
    Onsite,
}

impl FromStr for RemoteType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "remote" => Ok(RemoteType::Remote),
            "hybrid" => Ok(RemoteType::Hybrid),
            "onsite" => Ok(RemoteType::Onsite),
            other => Err(format!("unknown remote type `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    FullTime,
    PartTime,
    Contract,
    Internship,
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full-time" | "fulltime" => Ok(JobType::FullTime),
            "part-time" | "parttime" => Ok(JobType::PartTime),
            "contract" => Ok(JobType::Contract),
            "internship" => Ok(JobType::Internship),
            other => Err(format!("unknown job type `{other}`")),
        }
    }
}

/// Recency filter for postings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PostedWithin {
    PastDay,
    Past3Days,
    PastWeek,
    PastMonth,
}

impl PostedWithin {
    pub fn days(&self) -> i64 {
        match self {
            PostedWithin::PastDay => 1,
            PostedWithin::Past3Days => 3,
            PostedWithin::PastWeek => 7,
            PostedWithin::PastMonth => 30,
        }
    }

    /// Oldest acceptable posting date relative to `now`.
    pub fn cutoff_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.days())
    }
}

impl FromStr for PostedWithin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "past-day" | "day" => Ok(PostedWithin::PastDay),
            "past-3-days" | "3-days" => Ok(PostedWithin::Past3Days),
            "past-week" | "week" => Ok(PostedWithin::PastWeek),
            "past-month" | "month" => Ok(PostedWithin::PastMonth),
            other => Err(format!("unknown recency filter `{other}`")),
        }
    }
}

/// Immutable search input handed to the aggregation core by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSearchQuery {
    pub keywords: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub remote_types: Vec<RemoteType>,
    #[serde(default)]
    pub job_types: Vec<JobType>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub posted_within: Option<PostedWithin>,
    /// 1-based page index.
    pub page: u32,
    /// Requested page size; adapters apply their own source-specific caps.
    pub limit: u32,
}

impl Default for JobSearchQuery {
    fn default() -> Self {
        Self {
            keywords: None,
            location: None,
            remote_types: Vec::new(),
            job_types: Vec::new(),
            salary_min: None,
            salary_max: None,
            posted_within: None,
            page: 1,
            limit: 20,
        }
    }
}

impl JobSearchQuery {
    /// Copy with page and limit clamped into their valid ranges.
    pub fn normalized(&self) -> Self {
        let mut query = self.clone();
        query.page = query.page.max(1);
        query.limit = query.limit.max(1);
        query
    }
}

/// Canonical job record produced by source adapters.
///
/// Built fresh on every search or detail call and never mutated afterwards.
/// Identity for dedup is `(source, external_id)`, or cross-source the
/// normalized title/company/location fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub external_id: String,
    pub source: JobSource,
    pub title: String,
    pub company: String,
    pub location: String,
    pub remote_type: Option<RemoteType>,
    pub job_type: Option<JobType>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub description: String,
    pub requirements: Vec<String>,
    pub responsibilities: Vec<String>,
    pub benefits: Vec<String>,
    pub posted_date: DateTime<Utc>,
    pub apply_url: String,
}

impl Job {
    /// Deterministic platform id derived from the natural key, distinct from
    /// the board-native `external_id`.
    pub fn deterministic_id(source: JobSource, external_id: &str) -> Uuid {
        let seed = format!("{}:{}", source.as_str(), external_id);
        Uuid::new_v5(&Uuid::NAMESPACE_URL, seed.as_bytes())
    }

    /// Cross-source dedup key: lower-cased, whitespace-collapsed
    /// title/company/location triple.
    pub fn fingerprint(&self) -> String {
        [&self.title, &self.company, &self.location]
            .iter()
            .map(|part| normalize_fragment(part))
            .collect::<Vec<_>>()
            .join("|")
    }
}

/// Lower-case a string and collapse every whitespace run to a single space.
pub fn normalize_fragment(input: &str) -> String {
    input
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn query_normalization_clamps_page_and_limit() {
        let query = JobSearchQuery {
            page: 0,
            limit: 0,
            ..JobSearchQuery::default()
        };
        let normalized = query.normalized();
        assert_eq!(normalized.page, 1);
        assert_eq!(normalized.limit, 1);

        let untouched = JobSearchQuery::default().normalized();
        assert_eq!(untouched.page, 1);
        assert_eq!(untouched.limit, 20);
    }

    #[test]
    fn posted_within_cutoff_is_relative_to_now() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).single().unwrap();
        let cutoff = PostedWithin::PastWeek.cutoff_from(now);
        assert_eq!(cutoff, Utc.with_ymd_and_hms(2026, 3, 3, 12, 0, 0).single().unwrap());
    }

    #[test]
    fn deterministic_id_is_stable_and_source_scoped() {
        let a = Job::deterministic_id(JobSource::Indeed, "abc-123");
        let b = Job::deterministic_id(JobSource::Indeed, "abc-123");
        let c = Job::deterministic_id(JobSource::LinkedIn, "abc-123");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn fingerprint_ignores_case_and_whitespace_runs() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).single().unwrap();
        let mk = |title: &str, company: &str, location: &str| Job {
            id: Job::deterministic_id(JobSource::Indeed, "x"),
            external_id: "x".into(),
            source: JobSource::Indeed,
            title: title.into(),
            company: company.into(),
            location: location.into(),
            remote_type: None,
            job_type: None,
            salary_min: None,
            salary_max: None,
            description: String::new(),
            requirements: vec![],
            responsibilities: vec![],
            benefits: vec![],
            posted_date: now,
            apply_url: String::new(),
        };
        let a = mk("Senior  Backend Engineer", "Acme", "Remote");
        let b = mk("senior backend engineer", "ACME", " remote ");
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn source_round_trips_through_strings() {
        for source in JobSource::ALL {
            assert_eq!(source.as_str().parse::<JobSource>().unwrap(), source);
        }
    }
}
