//! Upload validation: turn whatever the caller sent into a [`LicenseImage`].
//!
//! Three entry points feed the same type:
//!
//! * multipart parts (`POST /scan`): the declared `Content-Type` decides;
//! * base64 strings, bare or as `data:` URLs (`POST /extract`);
//! * local files (CLI `scan`): the type is sniffed from the magic bytes.
//!
//! Validation is deliberately shallow. The bytes are never decoded, resized or
//! re-encoded; an image the vision model cannot read is the model's problem
//! and comes back as an unstructured reply, not as a local error.

use crate::error::ScanError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt;
use std::path::Path;
use tracing::debug;

/// An uploaded license photo: raw bytes plus the declared MIME type.
///
/// Lives for the duration of one request and is never stored.
#[derive(Clone, PartialEq, Eq)]
pub struct LicenseImage {
    bytes: Vec<u8>,
    mime_type: String,
    file_name: Option<String>,
}

impl LicenseImage {
    /// Validate and wrap raw image bytes.
    ///
    /// Fails with [`ScanError::InvalidInput`] when `bytes` is empty or the
    /// declared type is not `image/*`. Parameters such as `; charset=` are
    /// dropped from the stored type.
    pub fn new(bytes: Vec<u8>, declared_type: &str) -> Result<Self, ScanError> {
        let mime_type = image_mime_essence(declared_type).ok_or_else(|| {
            ScanError::invalid_input(format!(
                "Unsupported content type '{}': expected an image",
                declared_type.trim()
            ))
        })?;
        if bytes.is_empty() {
            return Err(ScanError::invalid_input("Uploaded image is empty"));
        }
        Ok(Self {
            bytes,
            mime_type,
            file_name: None,
        })
    }

    /// Attach the client-side file name (for logging only).
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Decode a base64 image, either bare or wrapped in a `data:` URL.
    ///
    /// A `data:image/png;base64,` prefix declares the type. Bare base64 has
    /// its type sniffed from the decoded magic bytes.
    pub fn from_base64(input: &str) -> Result<Self, ScanError> {
        let input = input.trim();
        let (declared, payload) = match input.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest
                    .split_once(',')
                    .ok_or_else(|| ScanError::invalid_input("Malformed data URL: missing ','"))?;
                if !header.to_ascii_lowercase().ends_with(";base64") {
                    return Err(ScanError::invalid_input(
                        "Data URL must be base64 encoded",
                    ));
                }
                let mime = header.split(';').next().unwrap_or_default();
                (Some(mime.to_string()), payload)
            }
            None => (None, input),
        };

        let compact: String = payload
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let bytes = STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| ScanError::invalid_input(format!("Image is not valid base64: {e}")))?;
        debug!("Decoded base64 image → {} bytes", bytes.len());

        let mime = match declared {
            Some(m) => m,
            None => sniff_mime(&bytes)
                .ok_or_else(|| ScanError::invalid_input("Unrecognised image format"))?
                .to_string(),
        };
        Self::new(bytes, &mime)
    }

    /// Read an image from disk, taking its type from the file contents.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ScanError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ScanError::ReadFailed {
                path: path.to_path_buf(),
                source,
            })?;
        let mime = sniff_mime(&bytes).ok_or_else(|| {
            ScanError::invalid_input(format!(
                "'{}' is not a recognised image format",
                path.display()
            ))
        })?;
        let image = Self::new(bytes, mime)?;
        Ok(match path.file_name() {
            Some(name) => image.with_file_name(name.to_string_lossy()),
            None => image,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// Image bytes in Debug output would swamp the logs.
impl fmt::Debug for LicenseImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LicenseImage")
            .field("mime_type", &self.mime_type)
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Return the lower-cased `type/subtype` of a MIME string if it is an image type.
pub fn image_mime_essence(declared: &str) -> Option<String> {
    let essence = declared.split(';').next()?.trim().to_ascii_lowercase();
    let subtype = essence.strip_prefix("image/")?;
    if subtype.is_empty() || subtype.contains(char::is_whitespace) {
        return None;
    }
    Some(essence)
}

/// Guess an image MIME type from magic bytes.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    let format = image::guess_format(bytes).ok()?;
    let mime = format.to_mime_type();
    mime.starts_with("image/").then_some(mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

    #[test]
    fn accepts_image_types() {
        let img = LicenseImage::new(vec![1, 2, 3], "image/jpeg").unwrap();
        assert_eq!(img.mime_type(), "image/jpeg");
        assert_eq!(img.len(), 3);

        let img = LicenseImage::new(vec![1], "Image/PNG; charset=binary").unwrap();
        assert_eq!(img.mime_type(), "image/png");
    }

    #[test]
    fn rejects_non_image_types() {
        for ty in ["text/plain", "application/pdf", "image/", "", "imagejpeg"] {
            let err = LicenseImage::new(vec![1], ty).unwrap_err();
            assert!(matches!(err, ScanError::InvalidInput { .. }), "{ty}: {err}");
        }
    }

    #[test]
    fn rejects_empty_bytes() {
        let err = LicenseImage::new(Vec::new(), "image/png").unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn data_url_declares_type() {
        let url = format!("data:image/webp;base64,{}", STANDARD.encode(b"anything"));
        let img = LicenseImage::from_base64(&url).unwrap();
        assert_eq!(img.mime_type(), "image/webp");
        assert_eq!(img.bytes(), b"anything");
    }

    #[test]
    fn bare_base64_is_sniffed() {
        let b64 = STANDARD.encode(JPEG_MAGIC);
        let img = LicenseImage::from_base64(&b64).unwrap();
        assert_eq!(img.mime_type(), "image/jpeg");
    }

    #[test]
    fn base64_with_line_breaks() {
        let b64 = STANDARD.encode(PNG_MAGIC);
        let (a, b) = b64.split_at(8);
        let img = LicenseImage::from_base64(&format!("{a}\n{b}\n")).unwrap();
        assert_eq!(img.mime_type(), "image/png");
    }

    #[test]
    fn rejects_bad_base64_and_unknown_bytes() {
        assert!(LicenseImage::from_base64("not base64 at all!").is_err());
        let unknown = STANDARD.encode(b"plain text, not an image");
        assert!(LicenseImage::from_base64(&unknown).is_err());
        assert!(LicenseImage::from_base64("data:text/plain;base64,aGk=").is_err());
        assert!(LicenseImage::from_base64("data:image/png,rawbytes").is_err());
    }

    #[tokio::test]
    async fn from_path_sniffs_and_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("front.png");
        std::fs::write(&path, PNG_MAGIC).unwrap();

        let img = LicenseImage::from_path(&path).await.unwrap();
        assert_eq!(img.mime_type(), "image/png");
        assert_eq!(img.file_name(), Some("front.png"));
    }

    #[tokio::test]
    async fn from_path_missing_file() {
        let err = LicenseImage::from_path("/definitely/not/here.jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::ReadFailed { .. }));
    }
}
