//! Client error types

use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, ClientError>;

/// Application-level failure reported inside a 200 response envelope.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiError {
    /// Non-zero status code from the envelope
    pub code: i64,
    /// Message from the envelope (`msg`, falling back to `error`)
    pub message: String,
    /// Whatever the server put in `data`, if anything
    pub data: Option<serde_json::Value>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code {}: {}", self.code, self.message)
    }
}

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with something other than 200 OK
    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    /// JSON body could not be decoded
    #[error("JSON decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// XML encode/decode error
    #[error("XML error: {0}")]
    Xml(String),

    /// Non-zero code in the Cloudreve response envelope
    #[error("API error {0}")]
    Api(ApiError),

    /// Error document returned by the S3-compatible backend
    #[error("S3 error ({code}): {message}")]
    S3 {
        code: String,
        message: String,
        request_id: Option<String>,
    },

    /// The storage policy has no upload path in this client
    #[error("unsupported storage policy: {0}")]
    UnsupportedPolicy(String),

    /// Response was well-formed but missing something we need
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Local file access
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid client configuration
    #[error("configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Default, Deserialize)]
struct S3ErrorBody {
    #[serde(rename = "Code")]
    code: Option<String>,
    #[serde(rename = "Message")]
    message: Option<String>,
    #[serde(rename = "RequestId")]
    request_id: Option<String>,
}

impl ClientError {
    /// Parse an S3 error document.
    ///
    /// Returns `None` when the body is empty or carries no `<Code>`, which
    /// is how successful S3 replies look. Unparseable XML is an `Xml` error.
    pub fn from_s3_xml(xml: &str) -> Option<Self> {
        let xml = xml.trim();
        if xml.is_empty() {
            return None;
        }

        let body: S3ErrorBody = match quick_xml::de::from_str(xml) {
            Ok(body) => body,
            Err(e) => return Some(Self::Xml(e.to_string())),
        };

        body.code.map(|code| Self::S3 {
            code,
            message: body.message.unwrap_or_else(|| "Unknown error".to_string()),
            request_id: body.request_id,
        })
    }

    /// The HTTP status, if this error came from a non-200 response
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// The envelope code, if this is an application-level error
    pub fn api_code(&self) -> Option<i64> {
        match self {
            Self::Api(e) => Some(e.code),
            _ => None,
        }
    }

    /// Check if this is an access denied error
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::Status { status: 401 | 403, .. })
            || matches!(self, Self::S3 { code, .. } if code == "AccessDenied")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_s3_error() {
        let xml = r#"<?xml version="1.0"?>
<Error>
    <Code>AccessDenied</Code>
    <Message>Access Denied</Message>
    <RequestId>abc123</RequestId>
</Error>"#;

        let error = ClientError::from_s3_xml(xml).unwrap();
        assert!(error.is_access_denied());

        match error {
            ClientError::S3 { code, message, request_id } => {
                assert_eq!(code, "AccessDenied");
                assert_eq!(message, "Access Denied");
                assert_eq!(request_id, Some("abc123".to_string()));
            }
            other => panic!("Expected S3 error, got {other:?}"),
        }
    }

    #[test]
    fn test_successful_completion_is_not_an_error() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<CompleteMultipartUploadResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
    <Location>https://bucket.s3.example.com/key</Location>
    <Bucket>bucket</Bucket>
    <Key>key</Key>
    <ETag>"3858f62230ac3c915f300c664312c11f-1"</ETag>
</CompleteMultipartUploadResult>"#;

        assert!(ClientError::from_s3_xml(xml).is_none());
        assert!(ClientError::from_s3_xml("  \n").is_none());
    }

    #[test]
    fn test_api_error_display() {
        let err = ClientError::Api(ApiError {
            code: 40001,
            message: "Path not exist".to_string(),
            data: None,
        });
        assert_eq!(err.to_string(), "API error code 40001: Path not exist");
        assert_eq!(err.api_code(), Some(40001));
        assert_eq!(err.status(), None);
    }
}
