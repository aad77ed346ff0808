use crate::error::PipelineError;
use crate::models::{is_unspecified_salary, JobRecord, Level, RenderedMessage};

pub const REQUIREMENTS_HEADING: &str = "**Requirements:**";
pub const REMOTE_TAG: &str = "🏠 Remote";
pub const SEPARATOR: &str = "---";

#[derive(Debug, Clone)]
pub struct FormatOptions {
    pub max_requirements: usize,
    /// Per-field cap in characters; keeps any single message bounded.
    pub max_field_len: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            max_requirements: 5,
            max_field_len: 200,
        }
    }
}

/// Render every job, skipping (and reporting) the ones that cannot be rendered.
pub fn format_all(jobs: &[JobRecord], options: &FormatOptions) -> (Vec<RenderedMessage>, Vec<PipelineError>) {
    let mut messages = Vec::with_capacity(jobs.len());
    let mut errors = Vec::new();

    for job in jobs {
        match format_job(job, options) {
            Ok(message) => messages.push(message),
            Err(e) => errors.push(e),
        }
    }

    (messages, errors)
}

/// Sections, in order: header, location, requirements, salary, level, link, separator.
pub fn format_job(job: &JobRecord, options: &FormatOptions) -> Result<RenderedMessage, PipelineError> {
    let title = required(job, "title", &job.title)?;
    let company = required(job, "company", &job.company)?;
    let url = required(job, "url", &job.url)?;
    let cap = options.max_field_len;

    let mut text = String::new();
    text.push_str(&format!("## 🚀 **{}**\n### 🏢 {}\n\n", truncate(title, cap), truncate(company, cap)));

    let location = job.location.trim();
    let mentions_remote = location.to_lowercase().contains("remote");
    match (location.is_empty(), job.is_remote && !mentions_remote) {
        (false, true) => {
            text.push_str(&format!("📍 {} | {}\n\n", truncate(location, cap), REMOTE_TAG));
        }
        (false, false) => {
            text.push_str(&format!("📍 {}\n\n", truncate(location, cap)));
        }
        (true, true) => {
            text.push_str(&format!("📍 {}\n\n", REMOTE_TAG));
        }
        (true, false) => {}
    }

    let requirements: Vec<&str> = job
        .requirements
        .iter()
        .map(|r| r.trim())
        .filter(|r| !r.is_empty())
        .take(options.max_requirements)
        .collect();
    if !requirements.is_empty() {
        text.push_str(REQUIREMENTS_HEADING);
        text.push('\n');
        for req in requirements {
            text.push_str(&format!("• {}\n", truncate(req, cap)));
        }
        text.push('\n');
    }

    if is_unspecified_salary(&job.salary) {
        text.push_str("💰 **Salary:** Not specified\n\n");
    } else {
        text.push_str(&format!("💰 **Salary:** {}\n\n", truncate(job.salary.trim(), cap)));
    }

    text.push_str(&format!("**Level:** {} {}\n\n", level_badge(job.level), job.level));
    text.push_str(&format!("**Apply here:** {}\n\n", url));
    text.push_str(SEPARATOR);
    text.push_str("\n\n");

    Ok(RenderedMessage {
        job_id: job.id.clone(),
        text,
    })
}

fn required<'a>(job: &JobRecord, field: &'static str, value: &'a str) -> Result<&'a str, PipelineError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(PipelineError::Format {
            job_id: job.id.clone(),
            field,
        });
    }
    Ok(value)
}

fn level_badge(level: Level) -> &'static str {
    match level {
        Level::Senior => "👑",
        Level::MidLevel => "⚙️",
        Level::Junior => "🌱",
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> JobRecord {
        JobRecord {
            id: "abc123".to_string(),
            title: "Machine Learning Engineer".to_string(),
            company: "AI Solutions".to_string(),
            location: "Seattle, WA".to_string(),
            url: "https://www.linkedin.com/jobs/view/abc123/".to_string(),
            description: "Build models".to_string(),
            requirements: vec!["Python".to_string(), "PyTorch".to_string()],
            salary: "$130,000 - $160,000".to_string(),
            is_remote: false,
            extracted_skills: vec!["Python".to_string()],
            level: Level::MidLevel,
            timestamp: "2025-01-01T00:00:00".to_string(),
        }
    }

    fn position(text: &str, needle: &str) -> usize {
        text.find(needle).unwrap_or_else(|| panic!("'{needle}' missing from:\n{text}"))
    }

    #[test]
    fn test_header_and_footer_text() {
        let msg = format_job(&job(), &FormatOptions::default()).unwrap();
        assert!(msg.text.starts_with("## 🚀 **Machine Learning Engineer**\n### 🏢 AI Solutions\n\n📍 Seattle, WA\n\n"));
        assert!(msg.text.contains("• Python\n• PyTorch\n\n"));
        assert!(msg.text.ends_with("**Apply here:** https://www.linkedin.com/jobs/view/abc123/\n\n---\n\n"));
    }

    #[test]
    fn test_sections_in_order() {
        let msg = format_job(&job(), &FormatOptions::default()).unwrap();
        let text = &msg.text;

        let order = [
            position(text, "Machine Learning Engineer"),
            position(text, "AI Solutions"),
            position(text, "📍 Seattle, WA"),
            position(text, REQUIREMENTS_HEADING),
            position(text, "• Python"),
            position(text, "💰 **Salary:** $130,000 - $160,000"),
            position(text, "**Level:** ⚙️ Mid-level"),
            position(text, "**Apply here:** https://www.linkedin.com/jobs/view/abc123/"),
            position(text, SEPARATOR),
        ];
        assert!(order.windows(2).all(|w| w[0] < w[1]), "out of order: {order:?}");
        assert_eq!(msg.job_id, "abc123");
    }

    #[test]
    fn test_empty_requirements_omit_section() {
        let mut j = job();
        j.requirements.clear();
        let msg = format_job(&j, &FormatOptions::default()).unwrap();
        assert!(!msg.text.contains("Requirements"));
        assert!(!msg.text.contains('•'));
    }

    #[test]
    fn test_requirements_capped_at_five() {
        let mut j = job();
        j.requirements = (1..=8).map(|i| format!("Skill {i}")).collect();
        let msg = format_job(&j, &FormatOptions::default()).unwrap();
        assert_eq!(msg.text.matches('•').count(), 5);
        assert!(msg.text.contains("• Skill 5"));
        assert!(!msg.text.contains("• Skill 6"));
    }

    #[test]
    fn test_remote_location_not_tagged_twice() {
        let mut j = job();
        j.is_remote = true;
        j.location = "Remote".to_string();
        let msg = format_job(&j, &FormatOptions::default()).unwrap();
        assert_eq!(msg.text.to_lowercase().matches("remote").count(), 1);

        j.location = "Toronto, Canada (Remote)".to_string();
        let msg = format_job(&j, &FormatOptions::default()).unwrap();
        assert_eq!(msg.text.to_lowercase().matches("remote").count(), 1);
    }

    #[test]
    fn test_remote_tag_appended_when_missing() {
        let mut j = job();
        j.is_remote = true;
        let msg = format_job(&j, &FormatOptions::default()).unwrap();
        assert!(msg.text.contains("📍 Seattle, WA | 🏠 Remote"));

        j.location = String::new();
        let msg = format_job(&j, &FormatOptions::default()).unwrap();
        assert!(msg.text.contains("📍 🏠 Remote"));
    }

    #[test]
    fn test_empty_location_not_remote_omits_line() {
        let mut j = job();
        j.location = "  ".to_string();
        let msg = format_job(&j, &FormatOptions::default()).unwrap();
        assert!(!msg.text.contains('📍'));
    }

    #[test]
    fn test_salary_line_always_present() {
        let mut j = job();
        j.salary = "Not mentioned".to_string();
        let msg = format_job(&j, &FormatOptions::default()).unwrap();
        assert!(msg.text.contains("💰 **Salary:** Not specified"));
    }

    #[test]
    fn test_missing_required_field_is_named() {
        for field in ["title", "company", "url"] {
            let mut j = job();
            match field {
                "title" => j.title.clear(),
                "company" => j.company = " ".to_string(),
                _ => j.url.clear(),
            }
            match format_job(&j, &FormatOptions::default()) {
                Err(PipelineError::Format { field: missing, job_id }) => {
                    assert_eq!(missing, field);
                    assert_eq!(job_id, "abc123");
                }
                other => panic!("expected format error for {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_format_all_skips_bad_records() {
        let mut bad = job();
        bad.id = "bad".to_string();
        bad.url.clear();
        let mut other = job();
        other.id = "other".to_string();

        let (messages, errors) = format_all(&[job(), bad, other], &FormatOptions::default());

        let ids: Vec<&str> = messages.iter().map(|m| m.job_id.as_str()).collect();
        assert_eq!(ids, vec!["abc123", "other"]);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_long_fields_are_truncated() {
        let mut j = job();
        j.requirements = vec!["x".repeat(500)];
        let options = FormatOptions {
            max_field_len: 20,
            ..Default::default()
        };
        let msg = format_job(&j, &options).unwrap();
        assert!(msg.text.contains(&format!("• {}...", "x".repeat(17))));
    }
}
