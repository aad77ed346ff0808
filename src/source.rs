use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;

use crate::models::{LEVEL_NOT_SPECIFIED, SALARY_NOT_SPECIFIED};
use crate::snapshot;

/// Anything that yields raw job records for a set of keywords.
///
/// Records come back as JSON values; shape validation happens downstream so
/// a single bad record never poisons the batch.
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn fetch(&self, keywords: &[String], location: &str, limit: usize) -> Result<Vec<Value>>;

    fn name(&self) -> &str;
}

// --- LinkedIn guest search ---

const LINKEDIN_SEARCH_URL: &str = "https://www.linkedin.com/jobs-guest/jobs/api/seeMoreJobPostings/search";
const PAST_WEEK: &str = "r604800";
const MAX_REQUIREMENTS: usize = 10;

#[derive(Debug, Clone, PartialEq)]
struct JobCard {
    id: String,
    title: String,
    company: String,
    location: String,
    url: String,
    salary: Option<String>,
}

pub struct LinkedInSource {
    client: reqwest::Client,
    fetch_details: bool,
}

impl LinkedInSource {
    pub fn new(fetch_details: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36")
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client, fetch_details })
    }

    async fn get_html(&self, url: &str, query: &[(&str, &str)]) -> Result<String> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to request {}", url))?;

        if !response.status().is_success() {
            return Err(anyhow!("LinkedIn request failed with status {}", response.status()));
        }

        response.text().await.context("Failed to read LinkedIn response body")
    }

    async fn card_to_record(&self, card: JobCard) -> Value {
        let (description, requirements) = if self.fetch_details {
            tokio::time::sleep(polite_delay(1000, 2000)).await;
            match self.get_html(&card.url, &[]).await {
                Ok(html) => parse_job_details(&html),
                Err(e) => {
                    tracing::warn!(id = %card.id, error = %e, "Failed to fetch job details");
                    (String::new(), Vec::new())
                }
            }
        } else {
            (String::new(), Vec::new())
        };

        let is_remote = card.location.to_lowercase().contains("remote");
        json!({
            "id": card.id,
            "title": card.title,
            "company": card.company,
            "location": card.location,
            "url": card.url,
            "description": description,
            "requirements": requirements,
            "salary": card.salary.unwrap_or_else(|| SALARY_NOT_SPECIFIED.to_string()),
            "is_remote": is_remote,
            "extracted_skills": [],
            "level": LEVEL_NOT_SPECIFIED,
            "timestamp": chrono::Local::now().to_rfc3339(),
        })
    }
}

#[async_trait]
impl ListingSource for LinkedInSource {
    async fn fetch(&self, keywords: &[String], location: &str, limit: usize) -> Result<Vec<Value>> {
        let per_keyword = per_keyword_quota(limit, keywords.len());
        let mut records = Vec::new();
        let mut failures = 0;

        for (position, keyword) in keywords.iter().enumerate() {
            if records.len() >= limit {
                break;
            }

            let mut query = vec![("keywords", keyword.as_str()), ("f_TPR", PAST_WEEK)];
            if !location.is_empty() {
                query.push(("location", location));
            }

            let cards = match self.get_html(LINKEDIN_SEARCH_URL, &query).await {
                Ok(html) => parse_search_cards(&html),
                Err(e) => {
                    tracing::warn!(keyword = %keyword, error = %e, "LinkedIn search failed");
                    failures += 1;
                    continue;
                }
            };

            if cards.is_empty() {
                tracing::info!(keyword = %keyword, "No job cards found");
            }

            let mut added = 0;
            for card in cards.into_iter().take(per_keyword) {
                if records.len() >= limit {
                    break;
                }
                records.push(self.card_to_record(card).await);
                added += 1;
            }
            tracing::info!(keyword = %keyword, added, "Collected LinkedIn jobs");

            if more_searches_pending(position, keywords.len(), records.len(), limit) {
                tokio::time::sleep(polite_delay(2000, 4000)).await;
            }
        }

        if !keywords.is_empty() && failures == keywords.len() {
            return Err(anyhow!("Every LinkedIn search request failed"));
        }

        Ok(records)
    }

    fn name(&self) -> &str {
        "linkedin"
    }
}

fn per_keyword_quota(limit: usize, keywords: usize) -> usize {
    if keywords == 0 {
        limit
    } else {
        (limit / keywords).max(1)
    }
}

/// Only wait between searches; nothing follows the last keyword or a full batch.
fn more_searches_pending(position: usize, keyword_count: usize, collected: usize, limit: usize) -> bool {
    position + 1 < keyword_count && collected < limit
}

fn polite_delay(min_ms: u64, max_ms: u64) -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn first_text(element: &ElementRef, css: &str) -> Option<String> {
    let sel = selector(css)?;
    element
        .select(&sel)
        .next()
        .map(|e| e.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
}

fn parse_search_cards(html: &str) -> Vec<JobCard> {
    let document = Html::parse_document(html);
    let mut cards = Vec::new();

    let card_selectors = ["div.base-card", "li.jobs-search-results__list-item"];
    let link_selector = selector("a.base-card__full-link, a.job-card-list__title");

    for css in card_selectors {
        let Some(card_selector) = selector(css) else { continue };
        for element in document.select(&card_selector) {
            let href = link_selector
                .as_ref()
                .and_then(|s| element.select(s).next())
                .and_then(|a| a.value().attr("href"))
                .unwrap_or("");
            if href.is_empty() {
                continue;
            }
            let url = href.split('?').next().unwrap_or(href).to_string();

            let id = element
                .value()
                .attr("data-entity-urn")
                .and_then(|urn| urn.rsplit(':').next())
                .map(str::to_string)
                .or_else(|| job_id_from_url(&url));
            let Some(id) = id else { continue };

            cards.push(JobCard {
                id,
                title: first_text(&element, "h3.base-search-card__title, h3.job-card-list__title")
                    .unwrap_or_default(),
                company: first_text(&element, "h4.base-search-card__subtitle, a.job-card-container__company-name")
                    .unwrap_or_default(),
                location: first_text(&element, "span.job-search-card__location, li.job-card-container__metadata-item")
                    .unwrap_or_default(),
                url,
                salary: first_text(&element, "span.job-search-card__salary-info"),
            });
        }
        if !cards.is_empty() {
            break;
        }
    }

    cards
}

/// `/jobs/view/data-scientist-at-acme-3812345678/` -> `3812345678`
fn job_id_from_url(url: &str) -> Option<String> {
    let segment = url.trim_end_matches('/').rsplit('/').next()?;
    let digits: String = segment
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if !digits.is_empty() {
        Some(digits)
    } else if !segment.is_empty() && !segment.contains(':') {
        Some(segment.to_string())
    } else {
        None
    }
}

fn parse_job_details(html: &str) -> (String, Vec<String>) {
    let document = Html::parse_document(html);

    let description_element = ["div.show-more-less-html__markup", "div.description__text"]
        .iter()
        .filter_map(|css| selector(css))
        .find_map(|sel| document.select(&sel).next());

    let Some(element) = description_element else {
        return (String::new(), Vec::new());
    };

    let description = element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    let requirements = selector("li")
        .map(|li| {
            element
                .select(&li)
                .map(|item| item.text().collect::<String>().trim().to_string())
                .filter(|text| text.chars().count() > 10)
                .take(MAX_REQUIREMENTS)
                .collect()
        })
        .unwrap_or_default();

    (description, requirements)
}

// --- Synthetic listings for offline runs ---

const COMPANIES: &[&str] = &[
    "TechGiant Inc.", "DataCorp", "AI Solutions", "Machine Learning Ltd.",
    "Neural Networks Co.", "Data Science Experts", "Algorithm Masters",
    "Predictive Analytics Inc.", "Deep Learning Solutions", "Model Trainers LLC",
];

const JOB_TITLES: &[&str] = &[
    "Data Scientist", "Machine Learning Engineer", "ML Engineer", "AI Engineer",
    "Data Engineer", "NLP Engineer", "Computer Vision Engineer", "MLOps Engineer",
    "AI Researcher", "Deep Learning Specialist", "Senior Data Scientist", "Junior Data Analyst",
];

const LOCATIONS: &[&str] = &[
    "San Francisco, CA", "New York, NY", "Seattle, WA", "Boston, MA", "Austin, TX",
    "Remote", "Chicago, IL", "Los Angeles, CA", "Toronto, Canada", "London, UK",
];

const REQUIREMENTS: &[&str] = &[
    "Python", "PyTorch", "TensorFlow", "SQL", "Spark", "Kubernetes", "Docker", "AWS",
    "GCP", "Computer Vision", "NLP", "Deep Learning", "Statistics", "PhD",
    "Master's Degree", "3+ years experience", "5+ years experience", "Git", "CI/CD",
];

const SALARIES: &[&str] = &[
    "Not specified", "$100,000 - $130,000", "$130,000 - $160,000", "$200,000+",
    "£60,000 - £80,000", "€70,000 - €90,000", "Competitive", "Not mentioned",
];

const DESCRIPTIONS: &[&str] = &[
    "We are looking for a talented {title} to join our team and work with {req1} and {req2}.",
    "Join our team as a {title}! Experience with {req1} is required; {req2} is a plus. Base pay from $120,000.",
    "Drive our AI initiatives forward as a {title}, working with {req1} and {req2} every day.",
];

pub struct FixtureSource {
    seed: Option<u64>,
}

impl FixtureSource {
    pub fn new(seed: Option<u64>) -> Self {
        Self { seed }
    }

    fn generate(&self, count: usize) -> Vec<Value> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        (0..count).map(|_| fixture_job(&mut rng)).collect()
    }
}

fn pick<'a>(rng: &mut StdRng, items: &[&'a str]) -> &'a str {
    items.choose(rng).copied().unwrap_or_default()
}

fn fixture_job(rng: &mut StdRng) -> Value {
    let title = pick(rng, JOB_TITLES);
    let mut location = pick(rng, LOCATIONS).to_string();
    let is_remote = location == "Remote" || rng.gen_bool(0.3);
    if is_remote && location != "Remote" {
        location = format!("{} (Remote)", location);
    }

    let count = rng.gen_range(3..=8);
    let requirements: Vec<&str> = REQUIREMENTS.choose_multiple(rng, count).copied().collect();
    let skills: Vec<&str> = requirements.iter().take(rng.gen_range(2..=5)).copied().collect();

    let level = if requirements.contains(&"PhD") || requirements.contains(&"5+ years experience") {
        "Senior"
    } else if requirements.contains(&"Master's Degree") || requirements.contains(&"3+ years experience") {
        "Mid-level"
    } else {
        LEVEL_NOT_SPECIFIED
    };

    let id = format!("{:08x}", rng.r#gen::<u32>());
    let description = pick(rng, DESCRIPTIONS)
        .replace("{title}", title)
        .replace("{req1}", requirements[0])
        .replace("{req2}", requirements[1]);
    let posted = chrono::Local::now() - chrono::Duration::days(rng.gen_range(0..=7));

    json!({
        "id": id,
        "title": title,
        "company": pick(rng, COMPANIES),
        "location": location,
        "url": format!("https://www.linkedin.com/jobs/view/{}/", id),
        "description": description,
        "requirements": requirements,
        "salary": pick(rng, SALARIES),
        "is_remote": is_remote,
        "extracted_skills": skills,
        "level": level,
        "timestamp": posted.to_rfc3339(),
    })
}

#[async_trait]
impl ListingSource for FixtureSource {
    async fn fetch(&self, keywords: &[String], _location: &str, limit: usize) -> Result<Vec<Value>> {
        let keywords: Vec<String> = keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        let jobs = self.generate(limit * 2).into_iter().filter(|job| {
            let title = job["title"].as_str().unwrap_or_default().to_lowercase();
            keywords.is_empty() || keywords.iter().any(|k| title.contains(k))
        });

        Ok(jobs.take(limit).collect())
    }

    fn name(&self) -> &str {
        "fixture"
    }
}

// --- Replay of a saved raw snapshot ---

pub struct SnapshotSource {
    path: PathBuf,
}

impl SnapshotSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl ListingSource for SnapshotSource {
    async fn fetch(&self, _keywords: &[String], _location: &str, limit: usize) -> Result<Vec<Value>> {
        let mut records = snapshot::load_raw(&self.path)?;
        records.truncate(limit);
        Ok(records)
    }

    fn name(&self) -> &str {
        "snapshot"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::parse_raw_records;

    const SEARCH_HTML: &str = r#"
        <ul>
          <li>
            <div class="base-card" data-entity-urn="urn:li:jobPosting:3812345678">
              <a class="base-card__full-link" href="https://www.linkedin.com/jobs/view/data-scientist-at-acme-3812345678?refId=abc&amp;trackingId=xyz"></a>
              <h3 class="base-search-card__title">
                  Senior Data Scientist
              </h3>
              <h4 class="base-search-card__subtitle"><a>Acme Corp</a></h4>
              <span class="job-search-card__location">Seattle, WA (Remote)</span>
              <span class="job-search-card__salary-info">$150,000 - $180,000</span>
            </div>
          </li>
          <li>
            <div class="base-card">
              <a class="base-card__full-link" href="https://www.linkedin.com/jobs/view/ml-engineer-at-globex-3899990000/"></a>
              <h3 class="base-search-card__title">ML Engineer</h3>
              <h4 class="base-search-card__subtitle">Globex</h4>
              <span class="job-search-card__location">Austin, TX</span>
            </div>
          </li>
          <li>
            <div class="base-card"><h3 class="base-search-card__title">No link</h3></div>
          </li>
        </ul>
    "#;

    #[test]
    fn test_parse_search_cards() {
        let cards = parse_search_cards(SEARCH_HTML);
        assert_eq!(cards.len(), 2);

        assert_eq!(cards[0].id, "3812345678");
        assert_eq!(cards[0].title, "Senior Data Scientist");
        assert_eq!(cards[0].company, "Acme Corp");
        assert_eq!(cards[0].location, "Seattle, WA (Remote)");
        assert_eq!(cards[0].url, "https://www.linkedin.com/jobs/view/data-scientist-at-acme-3812345678");
        assert_eq!(cards[0].salary.as_deref(), Some("$150,000 - $180,000"));

        assert_eq!(cards[1].id, "3899990000");
        assert_eq!(cards[1].company, "Globex");
        assert_eq!(cards[1].salary, None);
    }

    #[test]
    fn test_parse_search_cards_empty_page() {
        assert!(parse_search_cards("<html><body>No results</body></html>").is_empty());
    }

    #[test]
    fn test_job_id_from_url() {
        assert_eq!(
            job_id_from_url("https://www.linkedin.com/jobs/view/data-scientist-at-acme-3812345678/"),
            Some("3812345678".to_string())
        );
        assert_eq!(
            job_id_from_url("https://www.linkedin.com/jobs/view/3812345678"),
            Some("3812345678".to_string())
        );
        assert_eq!(
            job_id_from_url("https://jobs.example.com/posting/abc"),
            Some("abc".to_string())
        );
        assert_eq!(job_id_from_url(""), None);
    }

    #[test]
    fn test_parse_job_details() {
        let html = r#"
            <div class="show-more-less-html__markup">
              <p>We build forecasting models. Salary 120k USD.</p>
              <ul>
                <li>5+ years of Python experience</li>
                <li>SQL</li>
                <li>Experience with Kubernetes in production</li>
              </ul>
            </div>
        "#;

        let (description, requirements) = parse_job_details(html);

        assert!(description.contains("forecasting models"));
        assert_eq!(
            requirements,
            vec![
                "5+ years of Python experience".to_string(),
                "Experience with Kubernetes in production".to_string(),
            ]
        );
    }

    #[test]
    fn test_parse_job_details_missing_description() {
        let (description, requirements) = parse_job_details("<div>login wall</div>");
        assert!(description.is_empty());
        assert!(requirements.is_empty());
    }

    #[test]
    fn test_per_keyword_quota() {
        assert_eq!(per_keyword_quota(10, 2), 5);
        assert_eq!(per_keyword_quota(3, 7), 1);
        assert_eq!(per_keyword_quota(10, 0), 10);
    }

    #[test]
    fn test_no_delay_after_last_search() {
        assert!(more_searches_pending(0, 3, 2, 10));
        assert!(!more_searches_pending(2, 3, 2, 10));
        assert!(!more_searches_pending(0, 3, 10, 10));
        assert!(!more_searches_pending(0, 1, 0, 10));
    }

    #[tokio::test]
    async fn test_fixture_source_respects_limit_and_keywords() {
        let source = FixtureSource::new(Some(7));
        let keywords = vec!["engineer".to_string()];

        let jobs = source.fetch(&keywords, "", 5).await.unwrap();

        assert!(jobs.len() <= 5);
        for job in &jobs {
            let title = job["title"].as_str().unwrap().to_lowercase();
            assert!(title.contains("engineer"));
        }
    }

    #[tokio::test]
    async fn test_fixture_records_have_valid_shape() {
        let source = FixtureSource::new(Some(42));
        let jobs = source.fetch(&[], "", 10).await.unwrap();
        assert_eq!(jobs.len(), 10);

        let (records, errors) = parse_raw_records(jobs);
        assert!(errors.is_empty());
        assert_eq!(records.len(), 10);
        assert!(records.iter().all(|r| !r.url.is_empty() && !r.title.is_empty()));
    }

    #[tokio::test]
    async fn test_fixture_source_is_deterministic_with_seed() {
        let a = FixtureSource::new(Some(1)).fetch(&[], "", 3).await.unwrap();
        let b = FixtureSource::new(Some(1)).fetch(&[], "", 3).await.unwrap();
        let ids = |v: &[Value]| v.iter().map(|j| j["id"].clone()).collect::<Vec<_>>();
        assert_eq!(ids(&a), ids(&b));
    }
}
