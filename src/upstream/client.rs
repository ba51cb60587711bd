//! HTTP client for the report endpoint.
//!
//! One synchronous GET per poll against the fixed, versionless report URL.
//! The client carries a finite request timeout so the watch loop can never
//! hang indefinitely on a stalled connection.

use std::time::Duration;

use crate::core::config::UpstreamConfig;
use crate::core::errors::{AtwError, Result};

/// Capability seam for fetching the raw status body.
///
/// The watch loop only ever talks to this trait; tests substitute scripted
/// fetchers for [`HttpStatusClient`].
pub trait StatusFetcher {
    /// Fetch the raw report body for the given identifying parameters.
    fn fetch(&self, retrieval_code: &str, date_of_birth: &str) -> Result<String>;
}

/// Remove `-` separators from a retrieval code.
///
/// Codes are commonly handed out hyphenated (`abc-123-def`) but the endpoint
/// expects them bare.
#[must_use]
pub fn normalize_retrieval_code(retrieval_code: &str) -> String {
    retrieval_code.replace('-', "")
}

/// Blocking HTTP implementation of [`StatusFetcher`].
pub struct HttpStatusClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl HttpStatusClient {
    /// Build a client from upstream configuration.
    pub fn from_config(config: &UpstreamConfig) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AtwError::Transport {
                details: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn report_url(&self, retrieval_code: &str, date_of_birth: &str) -> String {
        format!(
            "{}/nabu/test-report/{}/{}",
            self.base_url,
            normalize_retrieval_code(retrieval_code),
            date_of_birth
        )
    }
}

impl StatusFetcher for HttpStatusClient {
    fn fetch(&self, retrieval_code: &str, date_of_birth: &str) -> Result<String> {
        let url = self.report_url(retrieval_code, date_of_birth);

        let response = self.http.get(&url).send().map_err(|e| AtwError::Transport {
            details: format!("GET {url}: {e}"),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AtwError::Transport {
                details: format!("GET {url}: unexpected status {status}"),
            });
        }

        response.text().map_err(|e| AtwError::Transport {
            details: format!("GET {url}: failed to read body: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> HttpStatusClient {
        HttpStatusClient::from_config(&UpstreamConfig {
            base_url: base_url.to_string(),
            request_timeout_secs: 1,
        })
        .unwrap()
    }

    #[test]
    fn normalize_strips_all_hyphens() {
        assert_eq!(normalize_retrieval_code("abc-123-def"), "abc123def");
        assert_eq!(normalize_retrieval_code("--a--"), "a");
        assert_eq!(normalize_retrieval_code("plain"), "plain");
        assert_eq!(normalize_retrieval_code(""), "");
    }

    #[test]
    fn report_url_templates_normalized_code_and_date() {
        let c = client("https://covid19.altius.org");
        assert_eq!(
            c.report_url("abc-123", "1990-01-02"),
            "https://covid19.altius.org/nabu/test-report/abc123/1990-01-02"
        );
    }

    #[test]
    fn report_url_tolerates_trailing_slash_in_base() {
        let c = client("https://covid19.altius.org/");
        assert_eq!(
            c.report_url("x", "d"),
            "https://covid19.altius.org/nabu/test-report/x/d"
        );
    }

    #[test]
    fn unreachable_endpoint_surfaces_transport_error() {
        // Reserved TEST-NET-1 address; connection fails within the 1s timeout.
        let c = client("http://192.0.2.1:9");
        let err = c.fetch("code", "date").expect_err("expected transport failure");
        assert_eq!(err.code(), "ATW-2001");
    }
}
