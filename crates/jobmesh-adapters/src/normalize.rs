//! Shared normalization heuristics. Every adapter funnels its raw records
//! through [`normalize_record`] so salary/remote/job-type/description
//! handling is identical across boards.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use jobmesh_core::{
    Job, JobSource, JobType, RemoteType, PLACEHOLDER_COMPANY, PLACEHOLDER_LOCATION,
    PLACEHOLDER_TITLE,
};
use regex::Regex;
use scraper::Html;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const MAX_MINED_REQUIREMENTS: usize = 5;
pub const MAX_REQUIREMENT_CHARS: usize = 200;

/// Loosely-typed listing payload as one board returned it. Field shapes vary
/// per source (salary may be a string, a `{min,max}` object, or absent), so
/// the flexible slots are plain JSON values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawJobRecord {
    pub external_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub salary: Value,
    #[serde(default)]
    pub job_type_hint: Option<String>,
    #[serde(default)]
    pub posted_at: Option<String>,
    #[serde(default)]
    pub apply_url: Option<String>,
    #[serde(default)]
    pub requirements: Value,
    #[serde(default)]
    pub responsibilities: Value,
    #[serde(default)]
    pub benefits: Value,
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("record has no usable external id")]
    MissingExternalId,
}

/// Build a canonical [`Job`] from one raw record. A record that cannot be
/// normalized is skipped by the caller; it never aborts the batch.
pub fn normalize_record(
    source: JobSource,
    raw: &RawJobRecord,
    now: DateTime<Utc>,
) -> Result<Job, NormalizeError> {
    let external_id = raw.external_id.trim();
    if external_id.is_empty() {
        return Err(NormalizeError::MissingExternalId);
    }

    let title = non_empty_or(raw.title.as_deref(), PLACEHOLDER_TITLE);
    let company = non_empty_or(raw.company.as_deref(), PLACEHOLDER_COMPANY);
    let location = non_empty_or(raw.location.as_deref(), PLACEHOLDER_LOCATION);
    let description = clean_description(raw.description.as_deref().unwrap_or_default());
    let (salary_min, salary_max) = parse_salary(&raw.salary);
    let remote_type = infer_remote_type(&title, &description, &location);
    let type_text = match raw.job_type_hint.as_deref() {
        Some(hint) => format!("{title} {hint}"),
        None => title.clone(),
    };
    let job_type = infer_job_type(&type_text);

    let mut requirements = string_list(&raw.requirements);
    if requirements.is_empty() {
        requirements = mine_requirements(&description);
    }
    let responsibilities = string_list(&raw.responsibilities);
    let benefits = string_list(&raw.benefits);

    let posted_date = parse_posted_date(raw.posted_at.as_deref(), now);
    let apply_url = match raw.apply_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => apply_url_fallback(source, external_id),
    };

    Ok(Job {
        id: Job::deterministic_id(source, external_id),
        external_id: external_id.to_string(),
        source,
        title,
        company,
        location,
        remote_type: Some(remote_type),
        job_type: Some(job_type),
        salary_min,
        salary_max,
        description,
        requirements,
        responsibilities,
        benefits,
        posted_date,
        apply_url,
    })
}

pub fn non_empty_or(value: Option<&str>, placeholder: &str) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => placeholder.to_string(),
    }
}

/// Strip HTML tags, decode entities and collapse whitespace runs.
pub fn clean_description(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text = fragment.root_element().text().collect::<String>();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Salary extraction: a `{min,max}` object passes through, a string yields
/// its first two numeric groups (thousands separators stripped), a bare
/// number becomes both bounds. Anything else parses to nothing.
pub fn parse_salary(value: &Value) -> (Option<i64>, Option<i64>) {
    match value {
        Value::Object(map) => {
            let min = map.get("min").and_then(json_to_i64);
            let max = map.get("max").and_then(json_to_i64);
            (min, max)
        }
        Value::String(text) => {
            let amounts = extract_amounts(text);
            (amounts.first().copied(), amounts.get(1).copied())
        }
        Value::Number(_) => {
            let n = json_to_i64(value);
            (n, n)
        }
        _ => (None, None),
    }
}

fn json_to_i64(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.round() as i64))
}

fn extract_amounts(text: &str) -> Vec<i64> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut seen_dot = false;
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch.is_ascii_digit() {
            current.push(ch);
            continue;
        }
        // thousands separator inside a group
        if ch == ','
            && !current.is_empty()
            && chars.peek().is_some_and(|c| c.is_ascii_digit())
        {
            continue;
        }
        if ch == '.'
            && !seen_dot
            && !current.is_empty()
            && chars.peek().is_some_and(|c| c.is_ascii_digit())
        {
            current.push(ch);
            seen_dot = true;
            continue;
        }
        flush_amount(&mut current, &mut seen_dot, &mut out);
    }
    flush_amount(&mut current, &mut seen_dot, &mut out);
    out
}

fn flush_amount(current: &mut String, seen_dot: &mut bool, out: &mut Vec<i64>) {
    if current.is_empty() {
        return;
    }
    if let Ok(v) = current.parse::<f64>() {
        out.push(v.round() as i64);
    }
    current.clear();
    *seen_dot = false;
}

/// Scan title, description and location (in that priority order) for a
/// remote/hybrid signal; the first field carrying one wins.
pub fn infer_remote_type(title: &str, description: &str, location: &str) -> RemoteType {
    for field in [title, description, location] {
        let lower = field.to_lowercase();
        if lower.contains("remote") {
            return RemoteType::Remote;
        }
        if lower.contains("hybrid") {
            return RemoteType::Hybrid;
        }
    }
    RemoteType::Onsite
}

pub fn infer_job_type(text: &str) -> JobType {
    let lower = text.to_lowercase();
    if lower.contains("intern") {
        return JobType::Internship;
    }
    if lower.contains("contract") || lower.contains("temporary") {
        return JobType::Contract;
    }
    if lower.contains("part-time") || lower.contains("part time") {
        return JobType::PartTime;
    }
    JobType::FullTime
}

fn requirement_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)(?:requirements?|qualifications?|must have)\s*:\s*([^.\n]{4,})",
            r"(?i)(\d+\+?\s*years?\b[^.\n]{0,160})",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("requirement pattern compiles"))
        .collect()
    })
}

/// Heuristic requirement mining over a cleaned description. Used only when
/// the source provides no structured requirements array.
pub fn mine_requirements(description: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for pattern in requirement_patterns() {
        for caps in pattern.captures_iter(description) {
            let Some(group) = caps.get(1) else { continue };
            let entry: String = group
                .as_str()
                .trim()
                .chars()
                .take(MAX_REQUIREMENT_CHARS)
                .collect();
            if entry.is_empty() || out.iter().any(|e| e.eq_ignore_ascii_case(&entry)) {
                continue;
            }
            out.push(entry);
            if out.len() == MAX_MINED_REQUIREMENTS {
                return out;
            }
        }
    }
    out
}

/// Array fields from loosely-typed payloads: arrays pass through, delimited
/// strings split on comma/semicolon/newline, anything else is empty.
pub fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(text) => text
            .split([',', ';', '\n'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// RFC 3339 or `YYYY-MM-DD`; anything else falls back to `now`.
pub fn parse_posted_date(value: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    let Some(text) = value.map(str::trim).filter(|t| !t.is_empty()) else {
        return now;
    };
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return parsed.with_timezone(&Utc);
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Utc.from_utc_datetime(&midnight);
        }
    }
    now
}

/// Source-constructed apply URL when the board omits one.
pub fn apply_url_fallback(source: JobSource, external_id: &str) -> String {
    match source {
        JobSource::LinkedIn => format!("https://www.linkedin.com/jobs/view/{external_id}"),
        JobSource::Indeed => format!("https://www.indeed.com/viewjob?jk={external_id}"),
        JobSource::Glassdoor => format!("https://www.glassdoor.com/job-listing/{external_id}"),
        JobSource::Adzuna => format!("https://www.adzuna.com/details/{external_id}"),
    }
}
