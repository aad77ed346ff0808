use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::error::PipelineError;
use crate::models::{is_unspecified_salary, JobRecord, Level, RawJobRecord, SALARY_IN_DESCRIPTION};

// Currency symbols anywhere. Codes may touch digits ("USD120k", "90kEUR") but not
// other letters, so "neural" and "Europe" do not count.
static CURRENCY_SIGNAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[$€£]|(?:^|[^a-z])(usd|eur|gbp)(?:[^a-z]|$)").expect("currency pattern is valid")
});

#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    /// Also drop records whose canonical URL was already seen under another id.
    pub dedup_by_url: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self { dedup_by_url: true }
    }
}

/// Deserialize each value on its own so one malformed record only costs itself.
pub fn parse_raw_records(values: Vec<Value>) -> (Vec<RawJobRecord>, Vec<PipelineError>) {
    let mut records = Vec::with_capacity(values.len());
    let mut errors = Vec::new();

    for (index, value) in values.into_iter().enumerate() {
        if !value.is_object() {
            errors.push(PipelineError::DataShape {
                index,
                reason: format!("expected an object, got {}", json_kind(&value)),
            });
            continue;
        }

        match serde_json::from_value::<RawJobRecord>(value) {
            Ok(record) if record.id.trim().is_empty() => {
                errors.push(PipelineError::DataShape {
                    index,
                    reason: "empty id".to_string(),
                });
            }
            Ok(record) => records.push(record),
            Err(e) => errors.push(PipelineError::DataShape {
                index,
                reason: e.to_string(),
            }),
        }
    }

    (records, errors)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Dedup first (first-seen wins), then fill salary and level on the survivors.
pub fn normalize(records: Vec<RawJobRecord>, options: &NormalizeOptions) -> Vec<JobRecord> {
    dedup(records, options)
        .into_iter()
        .map(normalize_record)
        .collect()
}

fn dedup(records: Vec<RawJobRecord>, options: &NormalizeOptions) -> Vec<RawJobRecord> {
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut kept = Vec::with_capacity(records.len());

    for record in records {
        if !seen_ids.insert(record.id.clone()) {
            tracing::debug!(id = %record.id, "Dropping duplicate job id");
            continue;
        }

        if options.dedup_by_url {
            if let Some(url) = canonical_url(&record.url) {
                if !seen_urls.insert(url) {
                    tracing::debug!(id = %record.id, url = %record.url, "Dropping duplicate job url");
                    continue;
                }
            }
        }

        kept.push(record);
    }

    kept
}

fn normalize_record(record: RawJobRecord) -> JobRecord {
    let salary = if is_unspecified_salary(&record.salary) {
        infer_salary(&record.description)
            .map(str::to_string)
            .unwrap_or(record.salary)
    } else {
        record.salary
    };

    let level = Level::parse(&record.level).unwrap_or_else(|| infer_level(&record.title));

    JobRecord {
        id: record.id,
        title: record.title,
        company: record.company,
        location: record.location,
        url: record.url,
        description: record.description,
        requirements: record.requirements,
        salary,
        is_remote: record.is_remote,
        extracted_skills: record.extracted_skills,
        level,
        timestamp: record.timestamp,
    }
}

/// Only flags that salary information exists; amounts in free text are not parsed.
pub fn infer_salary(description: &str) -> Option<&'static str> {
    CURRENCY_SIGNAL
        .is_match(description)
        .then_some(SALARY_IN_DESCRIPTION)
}

pub fn infer_level(title: &str) -> Level {
    let title = title.to_lowercase();
    if ["senior", "sr", "lead"].iter().any(|kw| title.contains(kw)) {
        Level::Senior
    } else if ["junior", "jr"].iter().any(|kw| title.contains(kw)) {
        Level::Junior
    } else {
        Level::MidLevel
    }
}

/// Strip tracking query params, fragments and trailing slashes so the same
/// posting reached through different links compares equal.
pub fn canonical_url(url: &str) -> Option<String> {
    let url = url.trim();
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let url = url[..end].trim_end_matches('/');
    if url.is_empty() {
        return None;
    }
    Some(url.to_lowercase())
}
