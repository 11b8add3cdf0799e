//! Pasted-image inlining.
//!
//! Rich-text editors hand us images as base64 data URIs embedded in the
//! markdown. Before a save lands on disk those URIs are decoded into files
//! under the note folder's media directory, named `img_N.<ext>` where `N`
//! is one more than the highest existing index (indices from deleted images
//! are never reused), and the markdown is rewritten to reference the file.

use std::path::Path;
use std::sync::LazyLock;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use regex::Regex;

use crate::config::Config;
use crate::error::{NotegroveError, Result};
use crate::fs::FileSystem;

/// File name prefix for converted images
pub const IMG_PREFIX: &str = "img_";

static IMG_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^img_(\d+)\.[A-Za-z0-9]+$").unwrap());

static DATA_URI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^data:image/([A-Za-z0-9.+-]+);base64,(.*)$").unwrap());

static INLINE_IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[[^\]]*\]\(\s*(data:image/[A-Za-z0-9.+-]+;base64,[A-Za-z0-9+/=\s]+?)\s*\)")
        .unwrap()
});

/// The index the next converted image in `media_dir` should use.
///
/// One past the highest `img_N.*` present, or `0` for a missing or empty
/// directory. Gaps left by deleted images are not reused.
pub fn next_image_index<FS: FileSystem>(fs: &FS, media_dir: &Path) -> u64 {
    if !fs.is_dir(media_dir) {
        return 0;
    }
    let entries = match fs.list_entries(media_dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Failed to list media dir {:?}: {}", media_dir, e);
            return 0;
        }
    };
    entries
        .iter()
        .filter(|e| !e.is_dir)
        .filter_map(|e| IMG_FILE_RE.captures(&e.name))
        .filter_map(|caps| caps[1].parse::<u64>().ok())
        .max()
        .map_or(0, |m| m + 1)
}

/// Decoded form of a `data:image/...;base64,...` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    /// File extension the image should be stored with
    pub extension: String,
    /// Raw image bytes
    pub bytes: Vec<u8>,
}

/// Parse and decode an image data URI.
pub fn parse_data_uri(uri: &str) -> Result<DecodedImage> {
    let caps = DATA_URI_RE
        .captures(uri.trim())
        .ok_or_else(|| NotegroveError::InvalidImageData("not an image data URI".to_string()))?;

    let extension = match &caps[1] {
        "jpeg" => "jpg".to_string(),
        "svg+xml" => "svg".to_string(),
        other => other.to_lowercase(),
    };

    let payload: String = caps[2].chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64
        .decode(payload.as_bytes())
        .map_err(|e| NotegroveError::InvalidImageData(format!("base64 decode failed: {e}")))?;

    if bytes.is_empty() {
        return Err(NotegroveError::InvalidImageData(
            "empty image payload".to_string(),
        ));
    }
    Ok(DecodedImage { extension, bytes })
}

/// Write image bytes into the media directory for `note_folder`.
///
/// Returns the markdown-relative URL of the stored file
/// (`<media_folder>/img_N.<ext>`).
pub fn save_media_image<FS: FileSystem>(
    fs: &FS,
    config: &Config,
    note_folder: &Path,
    image: &DecodedImage,
) -> Result<String> {
    let media_dir = config.media_dir(note_folder);
    let index = next_image_index(fs, &media_dir);
    let file_name = format!("{IMG_PREFIX}{index}.{}", image.extension);

    fs.create_dir_all(&media_dir)?;
    let path = media_dir.join(&file_name);
    fs.write_binary(&path, &image.bytes)
        .map_err(|source| NotegroveError::FileWrite { path, source })?;

    let folder = config.media_folder.trim_end_matches('/');
    Ok(format!("{folder}/{file_name}"))
}

/// Decode one pasted data URI and store it, returning the relative URL
pub fn inline_pasted_image<FS: FileSystem>(
    fs: &FS,
    config: &Config,
    note_folder: &Path,
    data_uri: &str,
) -> Result<String> {
    let image = parse_data_uri(data_uri)?;
    save_media_image(fs, config, note_folder, &image)
}

/// Replace every inline data-URI image in `content` with a stored file.
///
/// Returns the rewritten content and the number of images converted. A URI
/// that fails to decode is left in place and logged; the rest still
/// convert.
pub fn convert_all<FS: FileSystem>(
    fs: &FS,
    config: &Config,
    note_folder: &Path,
    content: &str,
) -> Result<(String, usize)> {
    let mut output = String::with_capacity(content.len());
    let mut last_end = 0;
    let mut converted = 0;

    for caps in INLINE_IMAGE_RE.captures_iter(content) {
        let uri = caps.get(1).unwrap();
        match parse_data_uri(uri.as_str()) {
            Ok(image) => {
                let url = save_media_image(fs, config, note_folder, &image)?;
                output.push_str(&content[last_end..uri.start()]);
                output.push_str(&url);
                last_end = uri.end();
                converted += 1;
            }
            Err(e) => {
                log::warn!("Skipping unconvertible inline image: {}", e);
            }
        }
    }
    output.push_str(&content[last_end..]);
    Ok((output, converted))
}
