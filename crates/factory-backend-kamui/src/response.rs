//! Artifact URL extraction from free-text backend output.
//!
//! The backend answers in prose. Two sources of URLs are recognized:
//!
//! - **Tagged** lines of the form `ARTIFACT_URL: <url>`, which the
//!   instruction trailer asks for.
//! - **Scraped** URLs matching a fixed set of patterns: any `https` URL ending
//!   in a known media extension, and any URL on the object-storage, user
//!   content CDN, or media-delivery hosts the backend serves results from.
//!
//! Scraped URLs form a set; duplicates collapse and input order is
//! irrelevant. [`ExtractedArtifacts::select`] applies the selection rule.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::request::Modality;

/// Prefix of the tagged artifact line.
pub const ARTIFACT_TAG: &str = "ARTIFACT_URL:";

/// Media extensions recognized at the end of an `https` URL.
pub const MEDIA_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "mp4", "mov", "mp3", "wav", "obj", "fbx", "gltf",
];

/// Host patterns whose URLs are always artifact candidates.
const HOST_PATTERNS: &[&str] = &[
    r#"https://storage\.googleapis\.com/[^\s<>"']+"#,
    r#"https://[a-zA-Z0-9.-]+\.googleusercontent\.com/[^\s<>"']+"#,
    r#"https://fal\.media/[^\s<>"']+"#,
];

const TAGGED_PATTERN: &str = r#"(?m)^[ \t]*ARTIFACT_URL:[ \t]*(https?://[^\s<>"']+)"#;

/// Characters that end a sentence rather than a URL.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '}'];

static SCRAPE_REGEXES: OnceLock<Vec<Regex>> = OnceLock::new();
static TAGGED_REGEX: OnceLock<Regex> = OnceLock::new();

fn scrape_regexes() -> &'static [Regex] {
    SCRAPE_REGEXES.get_or_init(|| {
        let media = format!(
            r#"https://[^\s<>"']+\.(?:{})"#,
            MEDIA_EXTENSIONS.join("|")
        );
        std::iter::once(media.as_str())
            .chain(HOST_PATTERNS.iter().copied())
            .map(|pattern| Regex::new(pattern).expect("invalid regex pattern"))
            .collect()
    })
}

fn tagged_regex() -> &'static Regex {
    TAGGED_REGEX.get_or_init(|| Regex::new(TAGGED_PATTERN).expect("invalid regex pattern"))
}

/// URLs found in a backend response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedArtifacts {
    /// Tagged URLs in output order, without repeats.
    pub tagged: Vec<String>,
    /// Pattern-scraped URLs.
    pub scraped: BTreeSet<String>,
}

impl ExtractedArtifacts {
    /// Returns true if no URL of either kind was found.
    pub fn is_empty(&self) -> bool {
        self.tagged.is_empty() && self.scraped.is_empty()
    }

    /// All distinct candidate URLs.
    pub fn candidates(&self) -> BTreeSet<String> {
        self.tagged
            .iter()
            .cloned()
            .chain(self.scraped.iter().cloned())
            .collect()
    }

    /// Picks the URL to download for `modality`.
    ///
    /// 1. The first tagged URL.
    /// 2. Otherwise scraped URLs that another scraped URL extends with a
    ///    query or fragment are dropped (the extension pattern cuts query
    ///    strings off URLs the host patterns capture whole).
    /// 3. Of the rest, URLs whose path extension fits `modality` are
    ///    preferred, and the lexicographically smallest wins.
    pub fn select(&self, modality: Modality) -> Option<&str> {
        if let Some(first) = self.tagged.first() {
            return Some(first.as_str());
        }

        let complete: Vec<&str> = self
            .scraped
            .iter()
            .map(String::as_str)
            .filter(|url| {
                !self.scraped.iter().any(|other| {
                    other
                        .strip_prefix(url)
                        .is_some_and(|rest| rest.starts_with(['?', '#']))
                })
            })
            .collect();

        let accepted = modality.accepted_extensions();
        complete
            .iter()
            .copied()
            .find(|url| url_extension(url).is_some_and(|ext| accepted.contains(&ext.as_str())))
            .or_else(|| complete.first().copied())
    }
}

/// Scrapes candidate URLs from `text` with the fixed pattern set.
pub fn extract_urls(text: &str) -> BTreeSet<String> {
    let mut urls = BTreeSet::new();
    for regex in scrape_regexes() {
        for found in regex.find_iter(text) {
            let url = trim_trailing_punctuation(found.as_str());
            if !url.is_empty() {
                urls.insert(url.to_string());
            }
        }
    }
    urls
}

/// Extracts tagged and scraped URLs from a backend response.
pub fn parse_response(text: &str) -> ExtractedArtifacts {
    let mut tagged: Vec<String> = Vec::new();
    for captures in tagged_regex().captures_iter(text) {
        let url = trim_trailing_punctuation(&captures[1]).to_string();
        if !tagged.contains(&url) {
            tagged.push(url);
        }
    }

    ExtractedArtifacts {
        tagged,
        scraped: extract_urls(text),
    }
}

fn trim_trailing_punctuation(url: &str) -> &str {
    url.trim_end_matches(TRAILING_PUNCTUATION)
}

/// Lowercased extension of the URL path, ignoring query and fragment.
pub fn url_extension(url: &str) -> Option<String> {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path_and_rest = without_scheme.split_once('/').map(|(_, rest)| rest)?;
    let path = path_and_rest
        .split(|c: char| c == '?' || c == '#')
        .next()
        .unwrap_or_default();
    let file = path.rsplit('/').next().unwrap_or_default();
    let (_, ext) = file.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn set(urls: &[&str]) -> BTreeSet<String> {
        urls.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_extracts_media_extension_url() {
        let text = "Done! Download: https://cdn.example.com/out/circle.jpg and enjoy";
        assert_eq!(
            extract_urls(text),
            set(&["https://cdn.example.com/out/circle.jpg"])
        );
    }

    #[test]
    fn test_extracts_known_hosts() {
        let text = "\
            a https://storage.googleapis.com/bucket/obj-123\n\
            b https://lh3.googleusercontent.com/abc/def\n\
            c https://fal.media/files/zebra/XYZ";
        assert_eq!(
            extract_urls(text),
            set(&[
                "https://fal.media/files/zebra/XYZ",
                "https://lh3.googleusercontent.com/abc/def",
                "https://storage.googleapis.com/bucket/obj-123",
            ])
        );
    }

    #[test]
    fn test_ignores_plain_http_and_unknown_hosts() {
        let text = "http://fal.media/files/a.png https://example.com/page";
        assert!(extract_urls(text).is_empty());
    }

    #[test]
    fn test_duplicates_collapse() {
        let url = "https://fal.media/files/a/video.mp4";
        let text = format!("{url}\nagain: {url}");
        assert_eq!(extract_urls(&text), set(&[url]));
    }

    #[test]
    fn test_order_independent() {
        let a = "https://fal.media/files/one.png";
        let b = "https://storage.googleapis.com/b/two.wav";
        let forward = extract_urls(&format!("{a} then {b}"));
        let backward = extract_urls(&format!("{b} then {a}"));
        assert_eq!(forward, backward);
        assert_eq!(forward.len(), 2);
    }

    #[test]
    fn test_stops_at_quotes_and_brackets() {
        let text = r#"<a href="https://fal.media/files/x.png">link</a>"#;
        assert_eq!(extract_urls(text), set(&["https://fal.media/files/x.png"]));
    }

    #[test]
    fn test_trailing_punctuation_dropped() {
        let text = "See (https://fal.media/files/abc). Also https://storage.googleapis.com/b/c, ok";
        assert_eq!(
            extract_urls(text),
            set(&[
                "https://fal.media/files/abc",
                "https://storage.googleapis.com/b/c",
            ])
        );
    }

    #[test]
    fn test_parse_response_tagged_line() {
        let text = "Here you go.\nARTIFACT_URL: http://127.0.0.1:8080/a.jpg\n  ARTIFACT_URL: https://fal.media/b.jpg\nARTIFACT_URL: http://127.0.0.1:8080/a.jpg";
        let artifacts = parse_response(text);
        assert_eq!(
            artifacts.tagged,
            vec!["http://127.0.0.1:8080/a.jpg", "https://fal.media/b.jpg"]
        );
        assert_eq!(artifacts.scraped, set(&["https://fal.media/b.jpg"]));
        assert_eq!(
            artifacts.select(Modality::Image),
            Some("http://127.0.0.1:8080/a.jpg")
        );
    }

    #[test]
    fn test_select_prefers_complete_url_over_truncated() {
        let text = "https://fal.media/files/a.png?token=abc";
        let artifacts = parse_response(text);
        assert_eq!(
            artifacts.scraped,
            set(&[
                "https://fal.media/files/a.png",
                "https://fal.media/files/a.png?token=abc",
            ])
        );
        assert_eq!(
            artifacts.select(Modality::Image),
            Some("https://fal.media/files/a.png?token=abc")
        );
    }

    #[test]
    fn test_select_keeps_distinct_url_sharing_a_prefix() {
        let text = "https://fal.media/files/a https://fal.media/files/a-preview.jpg";
        let artifacts = parse_response(text);
        assert_eq!(
            artifacts.scraped,
            set(&[
                "https://fal.media/files/a",
                "https://fal.media/files/a-preview.jpg",
            ])
        );
        assert_eq!(
            artifacts.select(Modality::Music),
            Some("https://fal.media/files/a")
        );
    }

    #[test]
    fn test_select_drops_url_cut_before_fragment() {
        let artifacts = ExtractedArtifacts {
            tagged: Vec::new(),
            scraped: set(&[
                "https://fal.media/files/song.mp3",
                "https://fal.media/files/song.mp3#t=0",
            ]),
        };
        assert_eq!(
            artifacts.select(Modality::Music),
            Some("https://fal.media/files/song.mp3#t=0")
        );
    }

    #[test]
    fn test_select_prefers_modality_extension() {
        let text = "preview https://fal.media/files/thumb.jpg video https://fal.media/files/clip.mp4";
        let artifacts = parse_response(text);
        assert_eq!(
            artifacts.select(Modality::Video),
            Some("https://fal.media/files/clip.mp4")
        );
        assert_eq!(
            artifacts.select(Modality::Image),
            Some("https://fal.media/files/thumb.jpg")
        );
    }

    #[test]
    fn test_select_falls_back_to_smallest() {
        let text = "https://storage.googleapis.com/b/zz https://fal.media/files/aa";
        let artifacts = parse_response(text);
        assert_eq!(
            artifacts.select(Modality::Music),
            Some("https://fal.media/files/aa")
        );
    }

    #[test]
    fn test_select_none_when_empty() {
        let artifacts = parse_response("Sorry, generation failed.");
        assert!(artifacts.is_empty());
        assert_eq!(artifacts.select(Modality::Image), None);
    }

    #[test]
    fn test_url_extension() {
        assert_eq!(url_extension("https://h/a/b.JPG").as_deref(), Some("jpg"));
        assert_eq!(url_extension("https://h/a/b.mp4?x=1.png").as_deref(), Some("mp4"));
        assert_eq!(url_extension("https://h/a/b"), None);
        assert_eq!(url_extension("https://h.com"), None);
    }
}
