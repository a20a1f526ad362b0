//! Image references in user input: detection, loading and message assembly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tchat_ai::{Content, Message};
use thiserror::Error;

/// Prompt sent when the input consists only of image references.
pub const DEFAULT_IMAGE_PROMPT: &str = "Describe this image in detail.";

/// Recognized image extensions and their MIME types.
pub const SUPPORTED_IMAGE_FORMATS: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("webp", "image/webp"),
    ("gif", "image/gif"),
    ("bmp", "image/bmp"),
];

const TRAILING_PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':'];

const FALLBACK_MIME: &str = "image/jpeg";

/// Errors from loading a single image. Never fatal to a turn.
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot expand ~: home directory unknown")]
    HomeDir,

    #[error("failed to download {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to download {url}: HTTP {status}")]
    Status { url: String, status: u16 },
}

/// User text split into prose and image references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedInput {
    pub text: String,
    pub image_paths: Vec<String>,
}

/// Split an input line into text and image references.
///
/// A whitespace-separated token is an image reference when, after trailing
/// punctuation is stripped, its extension is one of [`SUPPORTED_IMAGE_FORMATS`].
/// Whether the file exists is not checked here.
pub fn parse_input(line: &str) -> ParsedInput {
    let mut words = Vec::new();
    let mut image_paths = Vec::new();

    for token in line.split_whitespace() {
        let stripped = token.trim_end_matches(TRAILING_PUNCTUATION);
        if mime_for_path(stripped).is_some() {
            image_paths.push(stripped.to_string());
        } else {
            words.push(token);
        }
    }

    let mut text = words.join(" ");
    if text.is_empty() && !image_paths.is_empty() {
        text = DEFAULT_IMAGE_PROMPT.to_string();
    }

    ParsedInput { text, image_paths }
}

/// MIME type for a path or URL based on its extension (case-insensitive).
pub fn mime_for_path(path: &str) -> Option<&'static str> {
    let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
    SUPPORTED_IMAGE_FORMATS
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
}

fn is_remote(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

fn expand_home(path: &str) -> Result<PathBuf, MediaError> {
    match path.strip_prefix("~/") {
        Some(rest) => Ok(dirs::home_dir().ok_or(MediaError::HomeDir)?.join(rest)),
        None => Ok(PathBuf::from(path)),
    }
}

/// MIME type for a downloaded image: header first, then extension, then a generic default.
fn remote_mime(content_type: Option<&str>, url: &str) -> String {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(str::trim)
        .filter(|ct| !ct.is_empty())
        .map(str::to_string)
        .or_else(|| mime_for_path(url).map(str::to_string))
        .unwrap_or_else(|| FALLBACK_MIME.to_string())
}

/// A loaded image, consumed once to build a media part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub source_path: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageReference {
    pub fn to_content(&self) -> Content {
        Content::media(self.mime_type.clone(), &self.bytes)
    }
}

/// Loads images from local paths or http(s) URLs.
#[derive(Debug, Clone)]
pub struct ImageLoader {
    client: reqwest::Client,
}

impl ImageLoader {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Load one image.
    pub async fn load(&self, path: &str) -> Result<ImageReference, MediaError> {
        if is_remote(path) {
            return self.download(path).await;
        }

        let resolved = expand_home(path)?;
        let mime_type = resolved
            .to_str()
            .and_then(mime_for_path)
            .ok_or_else(|| MediaError::UnsupportedFormat(path.to_string()))?;

        let bytes = tokio::fs::read(&resolved)
            .await
            .map_err(|source| MediaError::Read {
                path: path.to_string(),
                source,
            })?;

        Ok(ImageReference {
            source_path: path.to_string(),
            mime_type: mime_type.to_string(),
            bytes,
        })
    }

    async fn download(&self, url: &str) -> Result<ImageReference, MediaError> {
        let download_err = |source| MediaError::Download {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(download_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await.map_err(download_err)?;

        Ok(ImageReference {
            source_path: url.to_string(),
            mime_type: remote_mime(content_type.as_deref(), url),
            bytes: bytes.to_vec(),
        })
    }

    /// Load every path in order, skipping (and logging) the ones that fail.
    pub async fn load_all(&self, paths: &[String]) -> Vec<ImageReference> {
        let mut images = Vec::with_capacity(paths.len());
        for path in paths {
            match self.load(path).await {
                Ok(image) => {
                    tracing::debug!(
                        path = %path,
                        mime = %image.mime_type,
                        bytes = image.bytes.len(),
                        "Loaded image"
                    );
                    images.push(image);
                }
                Err(e) => tracing::warn!(path = %path, error = %e, "Failed to load image"),
            }
        }
        images
    }
}

impl Default for ImageLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the user message for a turn: text first, then one media part per image.
pub fn build_user_message(text: &str, images: &[ImageReference]) -> Message {
    let mut content = Vec::with_capacity(images.len() + 1);
    content.push(Content::text(text));
    content.extend(images.iter().map(ImageReference::to_content));
    Message::user_with_content(content)
}
