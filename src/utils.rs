//! URL and path helpers

use crate::config::QualityPreset;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use url::Url;

/// Maximum length of a sanitized filename
const MAX_FILENAME_LEN: usize = 200;

/// Suffix the engine appends to in-progress downloads
const PARTIAL_SUFFIX: &str = ".part";

static YOUTUBE_ID_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").ok());

fn is_youtube_id(candidate: &str) -> bool {
    match YOUTUBE_ID_RE.as_ref() {
        Some(re) => re.is_match(candidate),
        None => candidate.len() == 11,
    }
}

/// Extract a stable video identifier from a URL
///
/// YouTube `watch?v=`, `youtu.be/`, `shorts/` and `embed/` URLs yield the
/// 11-character video ID, Vimeo URLs yield `vimeo_<id>`. Anything else gets
/// `video_` followed by the first 8 hex digits of the URL's SHA-256.
///
/// # Examples
///
/// ```
/// use video_dl::utils::extract_video_id;
///
/// assert_eq!(extract_video_id("https://youtu.be/dQw4w9WgXcQ?t=42"), "dQw4w9WgXcQ");
/// assert_eq!(extract_video_id("https://vimeo.com/76979871"), "vimeo_76979871");
/// ```
pub fn extract_video_id(url: &str) -> String {
    if let Ok(parsed) = Url::parse(url) {
        let host = parsed.host_str().unwrap_or("").trim_start_matches("www.");
        let host = host.trim_start_matches("m.");
        let mut segments = parsed
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect::<Vec<_>>())
            .unwrap_or_default();

        match host {
            "youtube.com" | "music.youtube.com" | "youtube-nocookie.com" => {
                let candidate = match segments.as_slice() {
                    ["watch"] => parsed
                        .query_pairs()
                        .find(|(k, _)| k == "v")
                        .map(|(_, v)| v.into_owned()),
                    ["shorts", id, ..] | ["embed", id, ..] | ["live", id, ..] => {
                        Some((*id).to_string())
                    }
                    _ => None,
                };
                if let Some(id) = candidate.filter(|id| is_youtube_id(id)) {
                    return id;
                }
            }
            "youtu.be" => {
                if let Some(id) = segments.first().filter(|id| is_youtube_id(id)) {
                    return (*id).to_string();
                }
            }
            "vimeo.com" | "player.vimeo.com" => {
                if host == "player.vimeo.com" && segments.first() == Some(&"video") {
                    segments.remove(0);
                }
                if let Some(id) = segments.first() {
                    return format!("vimeo_{id}");
                }
            }
            _ => {}
        }
    }

    let digest = Sha256::digest(url.as_bytes());
    let hex: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();
    format!("video_{hex}")
}

/// Extract the `list=` parameter of a playlist URL
pub fn extract_playlist_id(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .query_pairs()
        .find(|(k, _)| k == "list")
        .map(|(_, v)| v.into_owned())
        .filter(|id| !id.is_empty())
}

/// Replace characters that are unsafe in filenames
///
/// Path separators and reserved characters become `_`, runs of whitespace
/// collapse into a single `_`, and the result is truncated to 200 bytes on a
/// character boundary.
pub fn sanitize_filename(name: &str) -> String {
    const UNSAFE: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

    let replaced: String = name
        .chars()
        .map(|c| if UNSAFE.contains(&c) { '_' } else { c })
        .collect();
    let mut result = replaced.split_whitespace().collect::<Vec<_>>().join("_");

    if result.len() > MAX_FILENAME_LEN {
        let mut end = MAX_FILENAME_LEN;
        while !result.is_char_boundary(end) {
            end -= 1;
        }
        result.truncate(end);
    }

    result
}

/// Deterministic output path for a URL: `<dir>/<video id>.<container extension>`
///
/// Being derived from the URL alone lets an existing file be detected before
/// any engine call.
pub fn planned_output_path(download_dir: &Path, url: &str, quality: QualityPreset) -> PathBuf {
    let file_name = format!(
        "{}.{}",
        sanitize_filename(&extract_video_id(url)),
        quality.container_extension()
    );
    download_dir.join(file_name)
}

/// Path of the engine's partial file for an output path
pub fn partial_path(output_path: &Path) -> PathBuf {
    let mut os = output_path.as_os_str().to_owned();
    os.push(PARTIAL_SUFFIX);
    PathBuf::from(os)
}

/// Make a path absolute against the current directory
pub fn absolute_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Remove the partial file for an output path, logging failures
pub async fn remove_partial_artifact(output_path: &Path) {
    let partial = partial_path(output_path);
    match tokio::fs::remove_file(&partial).await {
        Ok(()) => tracing::debug!(path = %partial.display(), "removed partial download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %partial.display(), error = %e, "failed to remove partial download")
        }
    }
}
