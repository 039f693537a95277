//! Search provider backed by the public YouTube results page

use async_trait::async_trait;
use reqwest::header;
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info, warn};

use super::SearchProvider;
use crate::error::{Result, TubeError};
use crate::video::{Channel, Video, watch_url};

/// Forces SafeSearch on for every request
const SAFE_SEARCH_COOKIE: &str = "PREF=f2=8000000";

/// Restricts results to videos
const VIDEO_FILTER: &str = "EgIQAQ==";

/// Rotated between attempts so retries do not look identical
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

const INITIAL_DATA_MARKERS: &[&str] = &["var ytInitialData = ", "window[\"ytInitialData\"] = "];

pub struct YouTubeProvider {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
}

impl YouTubeProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_retries: 1,
        })
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    async fn fetch_once(&self, term: &str, limit: usize, attempt: u32) -> Result<Vec<Video>> {
        let user_agent = USER_AGENTS[attempt as usize % USER_AGENTS.len()];
        let response = self
            .client
            .get(format!("{}/results", self.base_url))
            .query(&[("search_query", term), ("sp", VIDEO_FILTER)])
            .header(header::USER_AGENT, user_agent)
            .header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .header(
                header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            )
            .header(header::COOKIE, SAFE_SEARCH_COOKIE)
            .header(header::DNT, "1")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TubeError::SearchFailed(format!(
                "upstream responded with {}",
                status
            )));
        }

        let body = response.text().await?;
        parse_results_page(&body, limit)
    }
}

#[async_trait]
impl SearchProvider for YouTubeProvider {
    async fn search(&self, term: &str, limit: usize) -> Result<Vec<Video>> {
        let mut attempt = 0;
        loop {
            info!("Attempting search for {:?} (attempt {})", term, attempt + 1);
            match self.fetch_once(term, limit, attempt).await {
                Ok(videos) => {
                    info!("Search succeeded: found {} videos", videos.len());
                    return Ok(videos);
                }
                Err(e) if attempt < self.max_retries => {
                    let wait = backoff_delay(attempt);
                    warn!(
                        "Search attempt {} failed: {}. Retrying in {}ms",
                        attempt + 1,
                        e,
                        wait.as_millis()
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!("Search failed after {} attempts: {}", attempt + 1, e);
                    return Err(e);
                }
            }
        }
    }
}

/// 3s, 9s, 27s ... plus up to 2s of jitter
pub fn backoff_delay(attempt: u32) -> Duration {
    let base_ms = 3u64.saturating_pow(attempt + 1).saturating_mul(1_000);
    Duration::from_millis(base_ms + fastrand::u64(0..2_000))
}

/// Extracts and normalizes video results from a results page.
pub fn parse_results_page(html: &str, limit: usize) -> Result<Vec<Video>> {
    let data = extract_initial_data(html)?;

    let mut renderers = Vec::new();
    collect_video_renderers(&data, &mut renderers);

    Ok(renderers
        .into_iter()
        .filter_map(video_from_renderer)
        .take(limit)
        .collect())
}

fn extract_initial_data(html: &str) -> Result<Value> {
    let start = INITIAL_DATA_MARKERS
        .iter()
        .find_map(|marker| html.find(marker).map(|idx| idx + marker.len()))
        .ok_or_else(|| TubeError::ParseError("initial data not found in page".to_string()))?;

    let rest = &html[start..];
    let end = rest
        .find(";</script>")
        .ok_or_else(|| TubeError::ParseError("initial data is not terminated".to_string()))?;

    serde_json::from_str(&rest[..end])
        .map_err(|e| TubeError::ParseError(format!("initial data is not valid JSON: {}", e)))
}

/// Depth-first walk collecting every `videoRenderer` in document order
fn collect_video_renderers<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key == "videoRenderer" {
                    out.push(child);
                } else {
                    collect_video_renderers(child, out);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_video_renderers(item, out);
            }
        }
        _ => {}
    }
}

fn video_from_renderer(renderer: &Value) -> Option<Video> {
    let id = renderer.get("videoId")?.as_str()?.to_string();

    let duration = renderer.get("lengthText").map(text_of).unwrap_or_default();
    let snippet = renderer
        .get("detailedMetadataSnippets")
        .and_then(|s| s.get(0))
        .and_then(|s| s.get("snippetText"))
        .or_else(|| renderer.get("descriptionSnippet"))
        .map(text_of)
        .unwrap_or_default();
    let thumbnail = renderer
        .pointer("/thumbnail/thumbnails")
        .and_then(Value::as_array)
        .and_then(|t| t.last())
        .and_then(|t| t.get("url"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Some(Video {
        title: renderer.get("title").map(text_of).unwrap_or_default(),
        duration_raw: parse_duration_ms(&duration),
        duration,
        snippet,
        upload_date: renderer.get("publishedTimeText").map(text_of).unwrap_or_default(),
        thumbnail_src: thumbnail.clone(),
        thumbnail,
        views: renderer.get("viewCountText").map(|v| parse_view_count(&text_of(v))).unwrap_or(0),
        channel: channel_from_renderer(renderer),
        url: watch_url(&id),
        id,
    })
}

fn channel_from_renderer(renderer: &Value) -> Channel {
    let owner = renderer
        .get("ownerText")
        .or_else(|| renderer.get("longBylineText"))
        .and_then(|o| o.pointer("/runs/0"));

    let Some(owner) = owner else {
        return Channel::default();
    };

    let browse = owner.pointer("/navigationEndpoint/browseEndpoint");
    let verified = renderer
        .get("ownerBadges")
        .and_then(Value::as_array)
        .map(|badges| {
            badges.iter().any(|b| {
                b.pointer("/metadataBadgeRenderer/style")
                    .and_then(Value::as_str)
                    .map(|s| s.contains("VERIFIED"))
                    .unwrap_or(false)
            })
        })
        .unwrap_or(false);

    Channel {
        name: owner
            .get("text")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or("Unknown")
            .to_string(),
        verified,
        id: browse
            .and_then(|b| b.get("browseId"))
            .and_then(Value::as_str)
            .map(String::from),
        url: browse
            .and_then(|b| b.get("canonicalBaseUrl"))
            .and_then(Value::as_str)
            .map(|path| format!("https://www.youtube.com{}", path))
            .unwrap_or_default(),
    }
}

/// Reads either `simpleText` or the concatenation of `runs[].text`
fn text_of(value: &Value) -> String {
    if let Some(simple) = value.get("simpleText").and_then(Value::as_str) {
        return simple.to_string();
    }
    value
        .get("runs")
        .and_then(Value::as_array)
        .map(|runs| {
            runs.iter()
                .filter_map(|r| r.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}

/// "1:02:03" -> 3_723_000
pub fn parse_duration_ms(text: &str) -> u64 {
    let mut total = 0u64;
    for part in text.trim().split(':') {
        match part.trim().parse::<u64>() {
            Ok(n) => total = total * 60 + n,
            Err(_) => return 0,
        }
    }
    total * 1_000
}

/// "1,234,567 views" -> 1234567, "No views" -> 0
pub fn parse_view_count(text: &str) -> u64 {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}
