//! Image payloads: files sent to the backend and `data:` URIs received from it

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use reqwest::multipart::Part;

use crate::error::{RareClientError, Result};

const OCTET_STREAM: &str = "application/octet-stream";

/// An image ready to be sent as a multipart file part
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl ImageFile {
    /// Wrap in-memory bytes; the content type is derived from `file_name`
    pub fn from_bytes(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let file_name = file_name.into();
        let content_type = content_type_for(Path::new(&file_name)).to_string();
        Self {
            file_name,
            content_type,
            bytes: bytes.into(),
        }
    }

    /// Read an image from disk
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        Ok(Self {
            file_name,
            content_type: content_type_for(path).to_string(),
            bytes: Bytes::from(bytes),
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Build the multipart part for this file
    pub(crate) fn to_part(&self) -> Result<Part> {
        Part::bytes(self.bytes.to_vec())
            .file_name(self.file_name.clone())
            .mime_str(&self.content_type)
            .map_err(|e| {
                RareClientError::invalid_input(format!(
                    "Invalid content type '{}': {}",
                    self.content_type, e
                ))
            })
    }
}

/// Guess an image content type from the file extension
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        _ => OCTET_STREAM,
    }
}

/// File extension conventionally used for a content type
pub fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/bmp" => "bmp",
        _ => "bin",
    }
}

/// A decoded `data:` URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub media_type: String,
    pub data: Vec<u8>,
}

impl DataUri {
    /// Parse a base64 `data:<media type>;base64,<payload>` URI
    pub fn parse(uri: &str) -> Result<Self> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| RareClientError::InvalidDataUri("missing 'data:' prefix".into()))?;

        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| RareClientError::InvalidDataUri("missing ',' separator".into()))?;

        let mut params = header.split(';');
        let media_type = match params.next() {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => "text/plain".to_string(),
        };

        if !params.any(|p| p.eq_ignore_ascii_case("base64")) {
            return Err(RareClientError::InvalidDataUri(
                "only base64 payloads are supported".into(),
            ));
        }

        let data = STANDARD
            .decode(payload.trim())
            .map_err(|e| RareClientError::InvalidDataUri(e.to_string()))?;

        Ok(Self { media_type, data })
    }

    /// Encode bytes as a base64 data URI
    pub fn encode(media_type: &str, data: &[u8]) -> String {
        format!("data:{};base64,{}", media_type, STANDARD.encode(data))
    }

    /// Suggested file extension for the payload
    pub fn extension(&self) -> &'static str {
        extension_for(&self.media_type)
    }

    /// Write the payload to `path`.
    ///
    /// A path without an extension gets one matching the media type. Returns
    /// the path actually written.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let mut path = path.as_ref().to_path_buf();
        if path.extension().is_none() {
            path.set_extension(self.extension());
        }
        tokio::fs::write(&path, &self.data).await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_detection() {
        assert_eq!(content_type_for(Path::new("fire.jpg")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("FIRE.JPEG")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("a/b/flood.png")), "image/png");
        assert_eq!(content_type_for(Path::new("storm.webp")), "image/webp");
        assert_eq!(content_type_for(Path::new("volcano")), OCTET_STREAM);
    }

    #[test]
    fn test_parse_png_data_uri() {
        let uri = DataUri::encode("image/png", b"\x89PNG\r\n");
        let parsed = DataUri::parse(&uri).unwrap();
        assert_eq!(parsed.media_type, "image/png");
        assert_eq!(parsed.data, b"\x89PNG\r\n");
        assert_eq!(parsed.extension(), "png");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            DataUri::parse("http://example.com/a.png"),
            Err(RareClientError::InvalidDataUri(_))
        ));
        assert!(matches!(
            DataUri::parse("data:image/png;base64"),
            Err(RareClientError::InvalidDataUri(_))
        ));
        assert!(matches!(
            DataUri::parse("data:text/plain,hello"),
            Err(RareClientError::InvalidDataUri(_))
        ));
        assert!(matches!(
            DataUri::parse("data:image/png;base64,@@@"),
            Err(RareClientError::InvalidDataUri(_))
        ));
    }

    #[test]
    fn test_from_bytes_detects_type() {
        let image = ImageFile::from_bytes("test.jpg", vec![1u8, 2, 3]);
        assert_eq!(image.content_type, "image/jpeg");
        assert_eq!(image.len(), 3);
        assert!(image.to_part().is_ok());
    }

    #[tokio::test]
    async fn test_save_adds_extension() {
        let dir = tempfile::tempdir().unwrap();
        let uri = DataUri::parse(&DataUri::encode("image/png", &[1, 2, 3])).unwrap();

        let written = uri.save(dir.path().join("generated")).await.unwrap();
        assert_eq!(written.extension().unwrap(), "png");
        assert_eq!(std::fs::read(&written).unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ref1.png");
        std::fs::write(&path, [0u8; 8]).unwrap();

        let image = ImageFile::from_path(&path).await.unwrap();
        assert_eq!(image.file_name, "ref1.png");
        assert_eq!(image.content_type, "image/png");
        assert_eq!(image.len(), 8);

        assert!(ImageFile::from_path(dir.path().join("missing.png"))
            .await
            .is_err());
    }
}
