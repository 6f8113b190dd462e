use std::fmt;

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SCHEME: &str = "data:";
const BASE64_MARKER: &str = "base64";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MediaError {
    #[error("media reference must be a `data:` URI")]
    MissingScheme,
    #[error("media reference has no `,` separating header and payload")]
    MissingSeparator,
    #[error("media reference does not declare a media type")]
    MissingMediaType,
    #[error("`{0}` is not a `type/subtype` media type")]
    InvalidMediaType(String),
    #[error("media payload must be base64 encoded (`;base64` marker missing)")]
    MissingBase64Marker,
    #[error("media payload is empty")]
    EmptyPayload,
    #[error("media payload is not valid base64: {0}")]
    InvalidBase64(String),
}

/// A self-describing media blob: `data:<mime>[;param]*;base64,<payload>`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDataUri {
    mime_type: String,
    payload: String,
}

impl MediaDataUri {
    pub fn parse(raw: &str) -> Result<Self, MediaError> {
        let rest = raw.trim().strip_prefix(SCHEME).ok_or(MediaError::MissingScheme)?;
        let (header, payload) = rest.split_once(',').ok_or(MediaError::MissingSeparator)?;

        let mut params = header.split(';');
        let mime_type = params.next().unwrap_or_default().trim();
        if mime_type.is_empty() {
            return Err(MediaError::MissingMediaType);
        }
        if !is_media_type(mime_type) {
            return Err(MediaError::InvalidMediaType(mime_type.to_string()));
        }
        if params.last().map(str::trim) != Some(BASE64_MARKER) {
            return Err(MediaError::MissingBase64Marker);
        }

        let payload = payload.trim();
        if payload.is_empty() {
            return Err(MediaError::EmptyPayload);
        }
        general_purpose::STANDARD
            .decode(payload)
            .map_err(|error| MediaError::InvalidBase64(error.to_string()))?;

        Ok(Self { mime_type: mime_type.to_ascii_lowercase(), payload: payload.to_string() })
    }

    /// Encodes raw bytes the way a browser `FileReader.readAsDataURL` would.
    pub fn encode(mime_type: &str, bytes: &[u8]) -> Result<Self, MediaError> {
        let mime_type = mime_type.trim();
        if mime_type.is_empty() {
            return Err(MediaError::MissingMediaType);
        }
        if !is_media_type(mime_type) {
            return Err(MediaError::InvalidMediaType(mime_type.to_string()));
        }
        if bytes.is_empty() {
            return Err(MediaError::EmptyPayload);
        }

        Ok(Self {
            mime_type: mime_type.to_ascii_lowercase(),
            payload: general_purpose::STANDARD.encode(bytes),
        })
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Base64 text, without the `data:` header.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_video(&self) -> bool {
        self.mime_type.starts_with("video/")
    }

    pub fn to_uri(&self) -> String {
        format!("{SCHEME}{};{BASE64_MARKER},{}", self.mime_type, self.payload)
    }
}

// Payloads run to tens of megabytes; keep them out of logs and panics.
impl fmt::Debug for MediaDataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaDataUri")
            .field("mime_type", &self.mime_type)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

fn is_media_type(value: &str) -> bool {
    let Some((kind, subtype)) = value.split_once('/') else {
        return false;
    };
    let token = |part: &str| {
        !part.is_empty()
            && part.chars().all(|ch| ch.is_ascii_alphanumeric() || "!#$&-^_.+".contains(ch))
    };
    token(kind) && token(subtype)
}

#[cfg(test)]
mod tests {
    use super::{MediaDataUri, MediaError};

    #[test]
    fn parses_browser_style_data_uri() {
        let media = MediaDataUri::parse("data:video/mp4;base64,AAAAIGZ0eXBpc29t").expect("valid");
        assert_eq!(media.mime_type(), "video/mp4");
        assert_eq!(media.payload(), "AAAAIGZ0eXBpc29t");
        assert!(media.is_video());
    }

    #[test]
    fn keeps_parameters_before_the_base64_marker() {
        let media = MediaDataUri::parse("data:video/webm;codecs=vp9;base64,GkXfow==")
            .expect("parameters are allowed");
        assert_eq!(media.mime_type(), "video/webm");
    }

    #[test]
    fn rejects_malformed_references() {
        let cases = [
            ("video/mp4;base64,AAAA", MediaError::MissingScheme),
            ("data:video/mp4;base64", MediaError::MissingSeparator),
            ("data:;base64,AAAA", MediaError::MissingMediaType),
            ("data:video;base64,AAAA", MediaError::InvalidMediaType("video".to_string())),
            ("data:video/mp4,AAAA", MediaError::MissingBase64Marker),
            ("data:video/mp4;base64,", MediaError::EmptyPayload),
        ];
        for (raw, expected) in cases {
            assert_eq!(MediaDataUri::parse(raw), Err(expected), "case {raw}");
        }
    }

    #[test]
    fn rejects_payload_outside_base64_alphabet() {
        let error = MediaDataUri::parse("data:video/mp4;base64,not base64!")
            .expect_err("invalid alphabet");
        assert!(matches!(error, MediaError::InvalidBase64(_)));
    }

    #[test]
    fn encode_produces_a_parseable_uri() {
        let media = MediaDataUri::encode("video/MP4", b"clip-bytes").expect("encode");
        let reparsed = MediaDataUri::parse(&media.to_uri()).expect("reparse");
        assert_eq!(reparsed, media);
        assert_eq!(MediaDataUri::encode("video/mp4", b""), Err(MediaError::EmptyPayload));
    }

    #[test]
    fn debug_output_omits_payload() {
        let media = MediaDataUri::encode("video/mp4", b"secret-frames").expect("encode");
        let debug = format!("{media:?}");
        assert!(!debug.contains(media.payload()));
        assert!(debug.contains("payload_len"));
    }
}
