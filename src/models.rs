use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

pub const SALARY_NOT_SPECIFIED: &str = "Not specified";
pub const SALARY_NOT_MENTIONED: &str = "Not mentioned";
pub const LEVEL_NOT_SPECIFIED: &str = "Not specified";

/// Salary value set when the description carries a currency signal but no
/// structured salary was supplied.
pub const SALARY_IN_DESCRIPTION: &str = "Mentioned in description";

pub fn is_unspecified_salary(salary: &str) -> bool {
    let salary = salary.trim();
    salary.is_empty() || salary == SALARY_NOT_SPECIFIED || salary == SALARY_NOT_MENTIONED
}

/// A job record as yielded by a listing source, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawJobRecord {
    pub id: String, // unique within one source, not across sources
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "string_or_list")]
    pub requirements: Vec<String>,
    #[serde(default = "default_salary")]
    pub salary: String, // "Not specified" / "Not mentioned" or a real value
    #[serde(default)]
    pub is_remote: bool,
    #[serde(default, deserialize_with = "string_or_list")]
    pub extracted_skills: Vec<String>,
    #[serde(default = "default_level")]
    pub level: String, // "Senior", "Mid-level", "Junior" or "Not specified"
    #[serde(default = "default_timestamp")]
    pub timestamp: String,
}

fn default_salary() -> String {
    SALARY_NOT_SPECIFIED.to_string()
}

fn default_level() -> String {
    LEVEL_NOT_SPECIFIED.to_string()
}

fn default_timestamp() -> String {
    chrono::Local::now().to_rfc3339()
}

// Some producers stringify list fields; accept a bare string as a single entry.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        List(Vec<String>),
        One(String),
    }

    Ok(match StringOrList::deserialize(deserializer)? {
        StringOrList::List(items) => items,
        StringOrList::One(s) if s.trim().is_empty() => Vec::new(),
        StringOrList::One(s) => vec![s],
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    Senior,
    #[serde(rename = "Mid-level")]
    MidLevel,
    Junior,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Senior => "Senior",
            Level::MidLevel => "Mid-level",
            Level::Junior => "Junior",
        }
    }

    /// Returns `None` for the "Not specified" sentinel and anything else
    /// that is not one of the three concrete levels.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "senior" => Some(Level::Senior),
            "mid-level" => Some(Level::MidLevel),
            "junior" => Some(Level::Junior),
            _ => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deduplicated job with a concrete level and, where detectable, a salary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub url: String,
    pub description: String,
    pub requirements: Vec<String>,
    pub salary: String,
    pub is_remote: bool,
    pub extracted_skills: Vec<String>,
    pub level: Level,
    pub timestamp: String,
}

impl From<JobRecord> for RawJobRecord {
    fn from(job: JobRecord) -> Self {
        Self {
            id: job.id,
            title: job.title,
            company: job.company,
            location: job.location,
            url: job.url,
            description: job.description,
            requirements: job.requirements,
            salary: job.salary,
            is_remote: job.is_remote,
            extracted_skills: job.extracted_skills,
            level: job.level.as_str().to_string(),
            timestamp: job.timestamp,
        }
    }
}

/// One chat-ready message for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedMessage {
    pub job_id: String,
    pub text: String,
}

impl RenderedMessage {
    /// Length in characters, which is what chat transports count.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}
