//! Video caption lookup over the public timed-text endpoint.

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, error};

use super::{Transcript, TranscriptFetcher};

/// Reason reported when no video id can be found.
pub const INVALID_URL_MESSAGE: &str = "Invalid YouTube URL";

/// Reason reported when captions cannot be retrieved.
pub const TRANSCRIPT_UNAVAILABLE_MESSAGE: &str = "Transcript unavailable for this video.";

const DEFAULT_BASE_URL: &str = "https://www.youtube.com";
const CAPTION_LANGUAGE: &str = "en";

static VIDEO_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:v=|/)([0-9A-Za-z_-]{11})").expect("video id pattern is valid"));

static CAPTION_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<text[^>]*>(.*?)</text>").expect("caption pattern is valid"));

static INNER_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag pattern is valid"));

/// Returns the 11-character video id referenced anywhere in `text`.
pub fn extract_video_id(text: &str) -> Option<&str> {
    VIDEO_ID.captures(text).and_then(|caps| caps.get(1)).map(|m| m.as_str())
}

/// Default [`TranscriptFetcher`].
#[derive(Debug, Clone)]
pub struct YouTubeTranscriptService {
    client: reqwest::Client,
    base_url: String,
}

impl Default for YouTubeTranscriptService {
    fn default() -> Self {
        Self::new()
    }
}

impl YouTubeTranscriptService {
    /// Creates a fetcher for English captions.
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, base_url: DEFAULT_BASE_URL.to_string() }
    }

    /// Points the fetcher at a different host.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn fetch_captions(&self, video_id: &str) -> Result<String, String> {
        let url = format!("{}/api/timedtext", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("lang", CAPTION_LANGUAGE), ("v", video_id)])
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("caption service returned {status}"));
        }

        let body = response.text().await.map_err(|e| format!("unreadable body: {e}"))?;
        let transcript = join_caption_segments(&body);
        if transcript.is_empty() {
            return Err("no caption track".to_string());
        }
        Ok(transcript)
    }
}

#[async_trait]
impl TranscriptFetcher for YouTubeTranscriptService {
    async fn fetch_transcript(&self, url: &str) -> Transcript {
        let Some(video_id) = extract_video_id(url) else {
            return Transcript::unavailable(INVALID_URL_MESSAGE);
        };

        match self.fetch_captions(video_id).await {
            Ok(text) => {
                debug!(video_id, chars = text.len(), "Fetched video transcript");
                Transcript::found(text)
            }
            Err(reason) => {
                error!(video_id, reason = %reason, "YouTube transcript failed");
                Transcript::unavailable(TRANSCRIPT_UNAVAILABLE_MESSAGE)
            }
        }
    }
}

/// Joins the `<text>` segments of a timed-text document with single spaces.
fn join_caption_segments(xml: &str) -> String {
    CAPTION_SEGMENT
        .captures_iter(xml)
        .filter_map(|caps| caps.get(1))
        .map(|segment| {
            let stripped = INNER_TAG.replace_all(segment.as_str(), "");
            let decoded = decode_entities(&stripped);
            decoded.split_whitespace().collect::<Vec<_>>().join(" ")
        })
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Captions arrive XML-escaped on top of HTML escaping (`&amp;#39;`), so
/// entities are decoded twice.
fn decode_entities(text: &str) -> String {
    let once = html_escape::decode_html_entities(text);
    html_escape::decode_html_entities(&once).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const CAPTIONS: &str = r#"<?xml version="1.0" encoding="utf-8" ?><transcript>
<text start="0.0" dur="1.5">Never gonna</text>
<text start="1.5" dur="2.0">give you up,
never gonna</text>
<text start="3.5" dur="1.0">let you down &amp; it&amp;#39;s fine</text>
</transcript>"#;

    #[test]
    fn test_extract_video_id_forms() {
        assert_eq!(extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), Some("dQw4w9WgXcQ"));
        assert_eq!(extract_video_id("summarize https://youtu.be/dQw4w9WgXcQ please"), Some("dQw4w9WgXcQ"));
        assert_eq!(extract_video_id("https://youtube.com/embed/dQw4w9WgXcQ?t=3"), Some("dQw4w9WgXcQ"));
        assert_eq!(extract_video_id("no link at all"), None);
        assert_eq!(extract_video_id("https://youtu.be/short"), None);
    }

    #[test]
    fn test_join_caption_segments() {
        assert_eq!(
            join_caption_segments(CAPTIONS),
            "Never gonna give you up, never gonna let you down & it's fine"
        );
        assert_eq!(join_caption_segments("<transcript></transcript>"), "");
    }

    #[test]
    fn test_numeric_entities_are_decoded() {
        assert_eq!(
            join_caption_segments(r#"<text start="0">it&#8217;s &#x27;ok&#x27; &#34;q&#34;</text>"#),
            "it\u{2019}s 'ok' \"q\""
        );
        assert_eq!(join_caption_segments("<text>line&amp;#10;break &amp;lt;3</text>"), "line break <3");
    }

    #[tokio::test]
    async fn test_invalid_url_sentinel() {
        let service = YouTubeTranscriptService::new();
        let transcript = service.fetch_transcript("what is this?").await;
        assert_eq!(transcript, Transcript::unavailable(INVALID_URL_MESSAGE));
    }

    #[tokio::test]
    async fn test_fetch_transcript_from_caption_service() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/timedtext")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("v".to_string(), "dQw4w9WgXcQ".to_string()),
                Matcher::UrlEncoded("lang".to_string(), "en".to_string()),
            ]))
            .with_status(200)
            .with_body(CAPTIONS)
            .create_async()
            .await;

        let service = YouTubeTranscriptService::new().with_base_url(server.url());
        let transcript =
            service.fetch_transcript("summarize https://www.youtube.com/watch?v=dQw4w9WgXcQ").await;

        mock.assert_async().await;
        assert!(transcript.success);
        assert!(transcript.text.starts_with("Never gonna give you up"));
    }

    #[tokio::test]
    async fn test_missing_captions_report_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/timedtext")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("")
            .create_async()
            .await;

        let service = YouTubeTranscriptService::new().with_base_url(server.url());
        let transcript = service.fetch_transcript("https://youtu.be/dQw4w9WgXcQ").await;
        assert_eq!(transcript, Transcript::unavailable(TRANSCRIPT_UNAVAILABLE_MESSAGE));
    }

    #[tokio::test]
    async fn test_server_error_reports_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/timedtext")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let service = YouTubeTranscriptService::new().with_base_url(server.url());
        let transcript = service.fetch_transcript("https://youtu.be/dQw4w9WgXcQ").await;
        assert!(!transcript.success);
    }
}
