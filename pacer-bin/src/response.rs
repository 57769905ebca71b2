use std::fmt::{self, Display};

use pacer_lib::{ErrorKind, Outcome};
use reqwest::StatusCode;
use serde::{Serialize, Serializer};

/// What happened to the request for one URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) enum ResponseStatus {
    /// The server answered, with any status code
    #[serde(rename = "status", serialize_with = "serialize_status_code")]
    Code(StatusCode),
    /// No answer: the URL was invalid, the request failed in transit or
    /// the dispatcher dropped it
    #[serde(rename = "error")]
    Error(String),
}

impl ResponseStatus {
    /// Returns `true` for 2xx and 3xx responses
    pub(crate) fn is_success(&self) -> bool {
        matches!(self, Self::Code(code) if code.is_success() || code.is_redirection())
    }

    pub(crate) const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl From<Outcome<reqwest::Response, reqwest::Error>> for ResponseStatus {
    fn from(outcome: Outcome<reqwest::Response, reqwest::Error>) -> Self {
        match outcome {
            Ok(response) => Self::Code(response.status()),
            // Show the transport error itself rather than the wrapper
            Err(ErrorKind::Execution(e)) => Self::Error(e.to_string()),
            Err(e) => Self::Error(e.to_string()),
        }
    }
}

fn serialize_status_code<S: Serializer>(code: &StatusCode, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u16(code.as_u16())
}

/// The result for a single URL, printed as one line of output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct Response {
    pub(crate) url: String,
    #[serde(flatten)]
    pub(crate) status: ResponseStatus,
}

impl Response {
    pub(crate) const fn new(url: String, status: ResponseStatus) -> Self {
        Self { url, status }
    }
}

impl Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            ResponseStatus::Code(code) => write!(f, "[{}] {}", code.as_u16(), self.url),
            ResponseStatus::Error(e) => write!(f, "[ERROR] {} | {e}", self.url),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_display() {
        let ok = Response::new("https://a.example".into(), ResponseStatus::Code(StatusCode::OK));
        assert_eq!(ok.to_string(), "[200] https://a.example");

        let failed = Response::new(
            "https://b.example".into(),
            ResponseStatus::Error("connection refused".into()),
        );
        assert_eq!(failed.to_string(), "[ERROR] https://b.example | connection refused");
    }

    #[test]
    fn test_success_includes_redirects() {
        assert!(ResponseStatus::Code(StatusCode::NO_CONTENT).is_success());
        assert!(ResponseStatus::Code(StatusCode::MOVED_PERMANENTLY).is_success());
        assert!(!ResponseStatus::Code(StatusCode::NOT_FOUND).is_success());
        assert!(!ResponseStatus::Error("timeout".into()).is_success());
    }

    #[test]
    fn test_rejection_message() {
        let outcome: Outcome<reqwest::Response, reqwest::Error> = Err(ErrorKind::Rejected);
        assert_eq!(
            ResponseStatus::from(outcome),
            ResponseStatus::Error("Dispatcher has been shut down, cannot accept request".into())
        );
    }

    #[test]
    fn test_serialize() {
        let ok = Response::new("https://a.example".into(), ResponseStatus::Code(StatusCode::IM_A_TEAPOT));
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"url": "https://a.example", "status": 418})
        );

        let failed = Response::new("https://b.example".into(), ResponseStatus::Error("boom".into()));
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({"url": "https://b.example", "error": "boom"})
        );
    }
}
