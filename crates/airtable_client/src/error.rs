use serde::Deserialize;
use thiserror::Error;

pub const UNKNOWN_ERROR: &str = "Unknown error occurred";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AirtableError {
    /// Airtable answered with a non-2xx status.
    #[error("{message}")]
    Api {
        status: u16,
        message: String,
        error_type: Option<String>,
    },
    /// The request never produced a response (DNS, TLS, connection reset...).
    #[error("{0}")]
    Transport(String),
    /// A 2xx response whose body did not have the expected shape.
    #[error("{0}")]
    Decode(String),
    #[error("Invalid Airtable url: {0}")]
    InvalidUrl(String),
}

// Airtable sends either {"error": {"type": .., "message": ..}} or {"error": "NOT_FOUND"}.
#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Detailed {
        #[serde(rename = "type")]
        error_type: Option<String>,
        message: Option<String>,
    },
    Code(serde::de::IgnoredAny),
}

impl AirtableError {
    pub fn from_response(status: u16, body: &str) -> Self {
        let (message, error_type) = match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(ErrorEnvelope {
                error: ErrorDetail::Detailed { error_type, message },
            }) => (message.filter(|m| !m.is_empty()), error_type),
            Ok(ErrorEnvelope {
                error: ErrorDetail::Code(_),
            })
            | Err(_) => (None, None),
        };

        AirtableError::Api {
            status,
            message: message.unwrap_or_else(|| format!("Request failed with status code {}", status)),
            error_type,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            AirtableError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn error_type(&self) -> Option<&str> {
        match self {
            AirtableError::Api { error_type, .. } => error_type.as_deref(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Human readable message, never empty.
    pub fn message(&self) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            UNKNOWN_ERROR.to_string()
        } else {
            message
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detailed_error_body() {
        let err = AirtableError::from_response(
            422,
            r#"{"error":{"type":"INVALID_FILTER_BY_FORMULA","message":"The formula for filtering records is invalid"}}"#,
        );
        assert_eq!(err.status(), Some(422));
        assert_eq!(err.error_type(), Some("INVALID_FILTER_BY_FORMULA"));
        assert_eq!(err.message(), "The formula for filtering records is invalid");
    }

    #[test]
    fn string_error_body_falls_back_to_status_message() {
        let err = AirtableError::from_response(404, r#"{"error":"NOT_FOUND"}"#);
        assert!(err.is_not_found());
        assert_eq!(err.error_type(), None);
        assert_eq!(err.message(), "Request failed with status code 404");
    }

    #[test]
    fn bare_error_code_of_any_shape_has_no_type() {
        let err = AirtableError::from_response(422, r#"{"error":["INVALID"]}"#);
        assert_eq!(err.error_type(), None);
        assert_eq!(err.message(), "Request failed with status code 422");
    }

    #[test]
    fn non_json_body() {
        let err = AirtableError::from_response(502, "<html>bad gateway</html>");
        assert_eq!(err.message(), "Request failed with status code 502");
        assert_eq!(err.status(), Some(502));
    }

    #[test]
    fn empty_transport_message_uses_fallback() {
        let err = AirtableError::Transport(String::new());
        assert_eq!(err.message(), UNKNOWN_ERROR);
        assert_eq!(err.status(), None);
    }
}
