use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataUrlError {
    #[error("image data is empty")]
    Empty,

    #[error("not a base64 data URL")]
    Malformed,

    #[error("unsupported file type: {0} (images only)")]
    NotImage(String),
}

/// An image held inline as `data:<mime>;base64,<payload>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    mime_type: String,
    payload: String,
}

impl DataUrl {
    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Result<Self, DataUrlError> {
        if bytes.is_empty() {
            return Err(DataUrlError::Empty);
        }
        let mime_type = normalize_image_mime(mime_type)?;
        Ok(Self {
            mime_type,
            payload: STANDARD.encode(bytes),
        })
    }

    pub fn parse(raw: &str) -> Result<Self, DataUrlError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(DataUrlError::Empty);
        }

        let rest = raw.strip_prefix("data:").ok_or(DataUrlError::Malformed)?;
        let (header, payload) = rest.split_once(',').ok_or(DataUrlError::Malformed)?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or(DataUrlError::Malformed)?;
        if payload.trim().is_empty() {
            return Err(DataUrlError::Empty);
        }

        Ok(Self {
            mime_type: normalize_image_mime(mime_type)?,
            payload: payload.trim().to_string(),
        })
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn as_string(&self) -> String {
        compose(&self.mime_type, &self.payload)
    }
}

/// Returns the raw base64 payload of a data URL. Input without a comma is
/// taken to already be the payload.
pub fn strip_prefix(image: &str) -> &str {
    match image.split_once(',') {
        Some((_, payload)) => payload.trim(),
        None => image,
    }
}

pub fn compose(mime_type: &str, payload: &str) -> String {
    format!("data:{mime_type};base64,{payload}")
}

pub fn is_image_mime(mime_type: &str) -> bool {
    normalize_image_mime(mime_type).is_ok()
}

/// Best-effort MIME type from a file name, for uploads that arrive without one.
pub fn guess_mime_from_name(file_name: &str) -> Option<&'static str> {
    match Path::new(file_name)
        .extension()
        .and_then(|v| v.to_str())
        .map(|v| v.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => Some("image/png"),
        Some("jpg") | Some("jpeg") => Some("image/jpeg"),
        Some("webp") => Some("image/webp"),
        Some("gif") => Some("image/gif"),
        _ => None,
    }
}

fn normalize_image_mime(mime_type: &str) -> Result<String, DataUrlError> {
    let normalized = mime_type.trim().to_ascii_lowercase();
    match normalized.strip_prefix("image/") {
        Some(subtype) if !subtype.is_empty() => Ok(normalized),
        _ => Err(DataUrlError::NotImage(mime_type.trim().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::{guess_mime_from_name, strip_prefix, DataUrl, DataUrlError};

    #[test]
    fn encodes_bytes_as_base64_data_url() {
        let url = DataUrl::from_bytes("image/PNG", b"abc").expect("encode");
        assert_eq!(url.mime_type(), "image/png");
        assert_eq!(url.as_string(), "data:image/png;base64,YWJj");
    }

    #[test]
    fn rejects_non_image_mime() {
        let err = DataUrl::from_bytes("application/pdf", b"%PDF").expect_err("pdf rejected");
        assert_eq!(err, DataUrlError::NotImage("application/pdf".to_string()));
        assert!(DataUrl::parse("data:text/plain;base64,aGk=").is_err());
    }

    #[test]
    fn parse_requires_base64_marker_and_payload() {
        assert_eq!(
            DataUrl::parse("data:image/png,raw").expect_err("missing marker"),
            DataUrlError::Malformed
        );
        assert_eq!(
            DataUrl::parse("data:image/png;base64,").expect_err("empty payload"),
            DataUrlError::Empty
        );
        let parsed = DataUrl::parse("data:image/jpeg;base64,QUJD").expect("parse");
        assert_eq!(parsed.payload(), "QUJD");
    }

    #[test]
    fn strip_prefix_falls_back_to_whole_input() {
        assert_eq!(strip_prefix("data:image/png;base64,QUJD"), "QUJD");
        assert_eq!(strip_prefix("QUJD"), "QUJD");
        assert_eq!(strip_prefix("data:image/png;base64,"), "");
    }

    #[test]
    fn guesses_mime_from_extension() {
        assert_eq!(guess_mime_from_name("cat.PNG"), Some("image/png"));
        assert_eq!(guess_mime_from_name("photo.jpeg"), Some("image/jpeg"));
        assert_eq!(guess_mime_from_name("notes.txt"), None);
    }
}
