//! services/api/src/adapters/extraction.rs
//!
//! This module contains the source-extraction adapter, which implements the
//! `SourceExtractionService` port. It turns each of the three source variants
//! (document bytes, article URL, video URL) into plain text.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use coursegen_core::domain::{RawExtraction, SourceInput};
use coursegen_core::ports::{PortError, PortResult, SourceExtractionService};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// The article strategy must yield at least this much text before we trust
/// it over the whole-body fallback.
const ARTICLE_MIN_CHARS: usize = 100;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that extracts plain text from documents, articles, and videos.
pub struct SourceExtractor {
    http: reqwest::Client,
    caption_primary_lang: String,
    caption_secondary_lang: String,
}

impl SourceExtractor {
    /// Creates a new `SourceExtractor` with a bounded-timeout HTTP client, so
    /// a stalled remote host cannot wedge a generation job indefinitely.
    pub fn new(caption_primary_lang: String, caption_secondary_lang: String) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            caption_primary_lang,
            caption_secondary_lang,
        }
    }

    async fn fetch_text(&self, url: &str) -> PortResult<String> {
        self.http
            .get(url)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to fetch {}: {}", url, e)))?
            .error_for_status()
            .map_err(|e| PortError::Unexpected(format!("Fetch of {} failed: {}", url, e)))?
            .text()
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to read body of {}: {}", url, e)))
    }

    async fn extract_article(&self, url: &str) -> PortResult<String> {
        let html = self.fetch_text(url).await?;
        let text = article_text(&html);
        if text.trim().is_empty() {
            return Err(PortError::Unexpected(format!(
                "No readable paragraph text found at {}",
                url
            )));
        }
        Ok(text)
    }

    async fn extract_transcript(&self, url: &str) -> PortResult<String> {
        let video_id = extract_video_id(url).ok_or_else(|| {
            PortError::Unexpected(format!("Could not resolve a video id from {}", url))
        })?;

        let watch_page = self
            .fetch_text(&format!("https://www.youtube.com/watch?v={}", video_id))
            .await?;

        let tracks = caption_tracks(&watch_page)?;
        let track = select_caption_track(
            &tracks,
            &self.caption_primary_lang,
            &self.caption_secondary_lang,
        )
        .ok_or_else(|| {
            PortError::Unexpected("This video has no caption tracks available".to_string())
        })?;

        let xml = self.fetch_text(&track.base_url).await?;
        let text = transcript_from_xml(&xml);
        if text.is_empty() {
            return Err(PortError::Unexpected(
                "Could not extract any text from the caption track".to_string(),
            ));
        }
        Ok(text)
    }
}

#[async_trait]
impl SourceExtractionService for SourceExtractor {
    async fn extract(&self, source: &SourceInput) -> PortResult<RawExtraction> {
        let text = match source {
            SourceInput::Document { bytes } => extract_document_text(bytes)?,
            SourceInput::Article { url } => self.extract_article(url).await?,
            SourceInput::Video { url } => self.extract_transcript(url).await?,
        };
        Ok(RawExtraction {
            text,
            kind: source.kind(),
        })
    }
}

//=========================================================================================
// Document (PDF) Extraction
//=========================================================================================

/// Parses PDF bytes and concatenates the text of every page.
fn extract_document_text(bytes: &[u8]) -> PortResult<String> {
    let document = lopdf::Document::load_mem(bytes)
        .map_err(|e| PortError::Unexpected(format!("Could not parse the document: {}", e)))?;

    let pages: Vec<u32> = document.get_pages().keys().copied().collect();
    let text = document
        .extract_text(&pages)
        .map_err(|e| PortError::Unexpected(format!("Could not read document text: {}", e)))?;

    if text.trim().is_empty() {
        return Err(PortError::Unexpected(
            "The document contains no extractable text".to_string(),
        ));
    }
    Ok(text)
}

//=========================================================================================
// Article Extraction
//=========================================================================================

const CHROME_ELEMENTS: [&str; 8] = [
    "script", "style", "nav", "footer", "header", "aside", "iframe", "noscript",
];

fn has_chrome_ancestor(paragraph: &ElementRef) -> bool {
    paragraph
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|el| CHROME_ELEMENTS.contains(&el.value().name()))
}

fn collect_paragraphs(doc: &Html, selector: &Selector) -> String {
    doc.select(selector)
        .filter(|p| !has_chrome_ancestor(p))
        .map(|p| p.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Extracts the readable text of a page: paragraphs inside the main
/// `<article>` container when one yields enough content, otherwise all
/// paragraph text in the body, skipping navigation chrome either way.
pub(crate) fn article_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let article_paragraphs = Selector::parse("article p").unwrap();
    let body_paragraphs = Selector::parse("body p").unwrap();

    let text = collect_paragraphs(&doc, &article_paragraphs);
    if text.len() >= ARTICLE_MIN_CHARS {
        return text;
    }
    collect_paragraphs(&doc, &body_paragraphs)
}

//=========================================================================================
// Video Transcript Extraction
//=========================================================================================

static VIDEO_ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"youtube\.com/watch\?v=([A-Za-z0-9_-]{11})",
        r"youtu\.be/([A-Za-z0-9_-]{11})",
        r"youtube\.com/embed/([A-Za-z0-9_-]{11})",
        r"youtube\.com/v/([A-Za-z0-9_-]{11})",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static CAPTIONS_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)"captions":\s*(\{.*?"playerCaptionsTracklistRenderer".*?\})\s*,\s*"videoDetails""#,
    )
    .unwrap()
});

static TEXT_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<text[^>]*>(.*?)</text>").unwrap());

static INNER_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Resolves the platform video id from the known URL shapes
/// (watch, short-link, embed, legacy `/v/`).
pub(crate) fn extract_video_id(url: &str) -> Option<String> {
    VIDEO_ID_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(url))
        .map(|captures| captures[1].to_string())
}

/// One caption track as listed in the watch page's player metadata.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CaptionTrack {
    #[serde(rename = "baseUrl")]
    pub base_url: String,
    #[serde(rename = "languageCode")]
    pub language_code: String,
}

/// Pulls the caption track list out of a watch-page HTML blob.
pub(crate) fn caption_tracks(watch_page: &str) -> PortResult<Vec<CaptionTrack>> {
    let captures = CAPTIONS_JSON.captures(watch_page).ok_or_else(|| {
        PortError::Unexpected("No captions are available for this video".to_string())
    })?;

    let value: serde_json::Value = serde_json::from_str(&captures[1])
        .map_err(|e| PortError::Unexpected(format!("Caption metadata did not parse: {}", e)))?;

    let tracks = value
        .get("playerCaptionsTracklistRenderer")
        .and_then(|r| r.get("captionTracks"))
        .cloned()
        .ok_or_else(|| {
            PortError::Unexpected("This video has no caption tracks available".to_string())
        })?;

    serde_json::from_value(tracks)
        .map_err(|e| PortError::Unexpected(format!("Caption track list did not parse: {}", e)))
}

/// Prefers the primary language, then the secondary, then the first track.
pub(crate) fn select_caption_track<'a>(
    tracks: &'a [CaptionTrack],
    primary: &str,
    secondary: &str,
) -> Option<&'a CaptionTrack> {
    tracks
        .iter()
        .find(|t| t.language_code == primary)
        .or_else(|| tracks.iter().find(|t| t.language_code == secondary))
        .or_else(|| tracks.first())
}

fn unescape_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace('\n', " ")
}

/// Concatenates the text segments of a caption track, unescaping entities
/// and normalizing embedded line breaks to spaces.
pub(crate) fn transcript_from_xml(xml: &str) -> String {
    TEXT_SEGMENT
        .captures_iter(xml)
        .map(|captures| {
            let content = INNER_TAG.replace_all(&captures[1], "");
            unescape_entities(&content).trim().to_string()
        })
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_video_ids_from_known_url_shapes() {
        let id = "dQw4w9WgXcQ";
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ?rel=0",
            "https://www.youtube.com/v/dQw4w9WgXcQ",
        ] {
            assert_eq!(extract_video_id(url).as_deref(), Some(id), "{}", url);
        }
    }

    #[test]
    fn rejects_urls_without_a_video_id() {
        assert!(extract_video_id("https://www.youtube.com/feed/library").is_none());
        assert!(extract_video_id("https://example.com/watch?v=tooshort").is_none());
    }

    fn track(lang: &str) -> CaptionTrack {
        CaptionTrack {
            base_url: format!("https://captions.example.com/{}", lang),
            language_code: lang.to_string(),
        }
    }

    #[test]
    fn caption_selection_prefers_primary_then_secondary_then_first() {
        let tracks = vec![track("de"), track("es"), track("en")];
        assert_eq!(
            select_caption_track(&tracks, "en", "es").unwrap().language_code,
            "en"
        );
        assert_eq!(
            select_caption_track(&tracks, "fr", "es").unwrap().language_code,
            "es"
        );
        assert_eq!(
            select_caption_track(&tracks, "fr", "it").unwrap().language_code,
            "de"
        );
        assert!(select_caption_track(&[], "en", "es").is_none());
    }

    #[test]
    fn parses_caption_tracks_from_a_watch_page() {
        let page = r#"var ytInitialPlayerResponse = {"captions": {"playerCaptionsTracklistRenderer": {"captionTracks": [{"baseUrl": "https://captions.example.com/en", "languageCode": "en", "name": {"simpleText": "English"}}]}}, "videoDetails": {"videoId": "dQw4w9WgXcQ"}};"#;
        let tracks = caption_tracks(page).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].language_code, "en");
    }

    #[test]
    fn watch_page_without_captions_is_an_error() {
        let err = caption_tracks("<html><body>nothing here</body></html>").unwrap_err();
        assert!(err.to_string().contains("No captions"));
    }

    #[test]
    fn transcript_segments_are_joined_and_unescaped() {
        let xml = concat!(
            r#"<transcript><text start="0.0" dur="2.1">Hello &amp; welcome</text>"#,
            r#"<text start="2.1" dur="1.4">to <i>the</i> course"#,
            "\nsecond line</text>",
            r#"<text start="3.5" dur="1.0">  </text></transcript>"#,
        );
        assert_eq!(
            transcript_from_xml(xml),
            "Hello & welcome to the course second line"
        );
    }

    #[test]
    fn article_container_paragraphs_win_over_body_fallback() {
        let html = format!(
            "<html><body><nav><p>Menu item that should never appear</p></nav>\
             <article><p>{}</p><p>{}</p></article>\
             <footer><p>Copyright notice</p></footer></body></html>",
            "First paragraph of the article body. ".repeat(3),
            "Second paragraph with more content.",
        );
        let text = article_text(&html);
        assert!(text.contains("First paragraph"));
        assert!(text.contains("Second paragraph"));
        assert!(!text.contains("Menu item"));
        assert!(!text.contains("Copyright"));
    }

    #[test]
    fn falls_back_to_body_paragraphs_when_no_article_tag() {
        let long = "Plain page paragraph with enough text to matter. ".repeat(4);
        let html = format!(
            "<html><body><div><p>{}</p></div><script><p>skip me</p></script></body></html>",
            long
        );
        let text = article_text(&html);
        assert!(text.contains("Plain page paragraph"));
        assert!(!text.contains("skip me"));
    }

    #[test]
    fn empty_document_bytes_fail_extraction() {
        assert!(extract_document_text(b"not a pdf at all").is_err());
    }
}
