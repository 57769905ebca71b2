use serde::Serialize;

use crate::response::{Response, ResponseStatus};

/// Outcome of a whole run, with every response in input order
#[derive(Debug, Default, Serialize)]
pub(crate) struct ResponseStats {
    pub(crate) total: usize,
    pub(crate) successful: usize,
    /// Responses with a 4xx or 5xx status
    pub(crate) failures: usize,
    /// Requests which never got a response
    pub(crate) errors: usize,
    #[serde(rename = "results")]
    pub(crate) responses: Vec<Response>,
}

impl ResponseStats {
    #[inline]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, response: Response) {
        self.total += 1;

        match &response.status {
            status if status.is_success() => self.successful += 1,
            ResponseStatus::Code(_) => self.failures += 1,
            ResponseStatus::Error(_) => self.errors += 1,
        }

        self.responses.push(response);
    }

    #[inline]
    pub(crate) const fn is_success(&self) -> bool {
        self.total == self.successful
    }
}

impl FromIterator<Response> for ResponseStats {
    fn from_iter<I: IntoIterator<Item = Response>>(iter: I) -> Self {
        let mut stats = Self::new();
        for response in iter {
            stats.add(response);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use reqwest::StatusCode;

    use super::*;

    fn response(url: &str, status: ResponseStatus) -> Response {
        Response::new(url.to_string(), status)
    }

    #[test]
    fn test_stats_is_empty() {
        let stats = ResponseStats::new();
        assert_eq!(stats.total, 0);
        assert!(stats.is_success());
    }

    #[test]
    fn test_stats_count_each_kind() {
        let stats: ResponseStats = [
            response("https://a.example", ResponseStatus::Code(StatusCode::OK)),
            response("https://b.example", ResponseStatus::Code(StatusCode::FOUND)),
            response("https://c.example", ResponseStatus::Code(StatusCode::NOT_FOUND)),
            response("https://d.example", ResponseStatus::Error("timed out".into())),
        ]
        .into_iter()
        .collect();

        assert_eq!(stats.total, 4);
        assert_eq!(stats.successful, 2);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.errors, 1);
        assert!(!stats.is_success());
    }

    #[test]
    fn test_stats_keep_input_order() {
        let stats: ResponseStats = ["https://z.example", "https://a.example"]
            .into_iter()
            .map(|url| response(url, ResponseStatus::Code(StatusCode::OK)))
            .collect();

        let urls: Vec<_> = stats.responses.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["https://z.example", "https://a.example"]);
        assert!(stats.is_success());
    }
}
