//! Capture sources and URL classification.
//!
//! Hosted-platform URLs (YouTube, Vimeo, Dailymotion) cannot be seeked
//! directly and go through the remote extraction pipeline; any other
//! http(s) URL is treated as direct media, and anything without a scheme
//! is a local file path.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::CoreError;

/// Where the frames come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "ref", rename_all = "camelCase")]
pub enum CaptureSource {
    /// A file on the local filesystem.
    LocalFile(PathBuf),
    /// Directly playable media behind a URL.
    LocalUrl(String),
    /// A page on a hosting platform; must be fetched first.
    RemoteEmbed(String),
}

impl CaptureSource {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LocalFile(_) => "localFile",
            Self::LocalUrl(_) => "localUrl",
            Self::RemoteEmbed(_) => "remoteEmbed",
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::RemoteEmbed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    YouTube,
    Vimeo,
    Dailymotion,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Self::YouTube, Self::Vimeo, Self::Dailymotion];

    pub fn display_name(self) -> &'static str {
        match self {
            Self::YouTube => "YouTube",
            Self::Vimeo => "Vimeo",
            Self::Dailymotion => "Dailymotion",
        }
    }

    /// The watch-page URL the fetcher understands best.
    pub fn watch_url(self, video_id: &str) -> String {
        match self {
            Self::YouTube => format!("https://www.youtube.com/watch?v={video_id}"),
            Self::Vimeo => format!("https://vimeo.com/{video_id}"),
            Self::Dailymotion => format!("https://www.dailymotion.com/video/{video_id}"),
        }
    }
}

/// A recognised hosted-platform URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformVideo {
    pub platform: Platform,
    pub video_id: String,
}

static PLATFORM_PATTERNS: LazyLock<Vec<(Platform, Regex)>> = LazyLock::new(|| {
    [
        (
            Platform::YouTube,
            r"^(https?://)?(www\.|m\.)?(youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/|youtube\.com/shorts/)([a-zA-Z0-9_-]{11})",
        ),
        (
            Platform::YouTube,
            r"^(https?://)?(www\.)?(youtube\.com/v/)([a-zA-Z0-9_-]{11})",
        ),
        (
            Platform::Vimeo,
            r"^(https?://)?(www\.)?(vimeo\.com/)(\d+)",
        ),
        (
            Platform::Vimeo,
            r"^(https?://)?(www\.)?(player\.vimeo\.com/video/)(\d+)",
        ),
        (
            Platform::Dailymotion,
            r"^(https?://)?(www\.)?(dailymotion\.com/(?:embed/)?video/)([a-zA-Z0-9]+)",
        ),
        (
            Platform::Dailymotion,
            r"^(https?://)?(www\.)?(dai\.ly/)([a-zA-Z0-9]+)",
        ),
    ]
    .into_iter()
    .map(|(platform, pattern)| (platform, Regex::new(pattern).expect("valid regex")))
    .collect()
});

/// Recognise a hosted-platform URL and pull out its video id.
pub fn detect_platform(url: &str) -> Option<PlatformVideo> {
    let url = url.trim();
    PLATFORM_PATTERNS.iter().find_map(|(platform, re)| {
        re.captures(url).and_then(|caps| caps.get(4)).map(|id| PlatformVideo {
            platform: *platform,
            video_id: id.as_str().to_string(),
        })
    })
}

/// Validate that a URL is http(s) with a non-empty host.
pub fn validate_http_url(url: &str) -> Result<(), CoreError> {
    let trimmed = url.trim();
    let rest = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .ok_or_else(|| {
            CoreError::Validation(format!(
                "URL must start with http:// or https://, got: '{trimmed}'"
            ))
        })?;
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() || host.chars().any(char::is_whitespace) {
        return Err(CoreError::Validation(format!(
            "URL has no valid host: '{trimmed}'"
        )));
    }
    Ok(())
}

/// Classify user input into a [`CaptureSource`].
///
/// Platform URLs are rewritten to their canonical watch URL (embed and
/// short forms included).
pub fn classify_source(input: &str) -> Result<CaptureSource, CoreError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("Source must not be empty".to_string()));
    }

    if let Some(video) = detect_platform(trimmed) {
        return Ok(CaptureSource::RemoteEmbed(
            video.platform.watch_url(&video.video_id),
        ));
    }

    if let Some(path) = trimmed.strip_prefix("file://") {
        return Ok(CaptureSource::LocalFile(PathBuf::from(path)));
    }

    if trimmed.contains("://") {
        validate_http_url(trimmed)?;
        return Ok(CaptureSource::LocalUrl(trimmed.to_string()));
    }

    Ok(CaptureSource::LocalFile(PathBuf::from(trimmed)))
}
