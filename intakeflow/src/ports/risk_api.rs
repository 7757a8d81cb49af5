//! External risk data source.

use async_trait::async_trait;

use crate::core::EnrichmentData;
use crate::errors::RiskApiError;

/// Fetches external risk data for one company.
#[async_trait]
pub trait RiskApi: Send + Sync {
    /// Fetches the raw risk record for `company_id`.
    ///
    /// # Errors
    ///
    /// One of the [`RiskApiError`] kinds; only `ClientPermanent` is terminal.
    async fn fetch(&self, company_id: &str) -> Result<EnrichmentData, RiskApiError>;
}

#[cfg(feature = "http")]
pub use http::HttpRiskApi;

#[cfg(feature = "http")]
mod http {
    use async_trait::async_trait;
    use reqwest::{Client, StatusCode, Url};
    use std::time::Duration;
    use tracing::debug;

    use super::RiskApi;
    use crate::core::EnrichmentData;
    use crate::errors::{IntakeflowError, RiskApiError};

    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Risk API client over HTTP: `GET {base_url}/companies/{id}/risk`.
    #[derive(Debug, Clone)]
    pub struct HttpRiskApi {
        client: Client,
        base_url: Url,
    }

    impl HttpRiskApi {
        /// Creates a client with the default 5 second request timeout.
        ///
        /// # Errors
        ///
        /// Returns a configuration error for an unusable base URL.
        pub fn new(base_url: &str) -> Result<Self, IntakeflowError> {
            Self::with_timeout(base_url, DEFAULT_TIMEOUT)
        }

        /// Creates a client with a custom request timeout.
        ///
        /// # Errors
        ///
        /// Returns a configuration error for an unusable base URL or if the
        /// HTTP client cannot be built.
        pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, IntakeflowError> {
            let base_url = Url::parse(base_url).map_err(|e| {
                IntakeflowError::config(format!("invalid risk API URL '{base_url}': {e}"))
            })?;
            if base_url.cannot_be_a_base() {
                return Err(IntakeflowError::config(format!(
                    "risk API URL '{base_url}' cannot be a base"
                )));
            }
            let client = Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| IntakeflowError::config(format!("cannot build HTTP client: {e}")))?;
            Ok(Self { client, base_url })
        }

        /// The URL queried for `company_id`.
        #[must_use]
        pub fn risk_url(&self, company_id: &str) -> Url {
            let mut url = self.base_url.clone();
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.pop_if_empty().extend(["companies", company_id, "risk"]);
            }
            url
        }
    }

    fn transport_error(err: &reqwest::Error) -> RiskApiError {
        if err.is_timeout() || err.is_connect() {
            RiskApiError::Timeout {
                message: err.to_string(),
            }
        } else {
            RiskApiError::ServerTransient {
                status: None,
                message: err.to_string(),
            }
        }
    }

    #[async_trait]
    impl RiskApi for HttpRiskApi {
        async fn fetch(&self, company_id: &str) -> Result<EnrichmentData, RiskApiError> {
            let url = self.risk_url(company_id);
            debug!(%url, company_id, "Fetching risk data");

            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| transport_error(&e))?;

            let status = response.status();
            if !status.is_success() {
                let reason = status.canonical_reason().unwrap_or("unexpected status");
                return Err(RiskApiError::from_status(
                    status.as_u16(),
                    format!("{reason} for company {company_id}"),
                ));
            }

            let body: serde_json::Value = response.json().await.map_err(|e| {
                if e.is_decode() {
                    RiskApiError::ClientPermanent {
                        status: Some(StatusCode::OK.as_u16()),
                        message: format!("malformed risk API response: {e}"),
                    }
                } else {
                    transport_error(&e)
                }
            })?;

            match body {
                serde_json::Value::Object(map) => Ok(map),
                other => Err(RiskApiError::ClientPermanent {
                    status: Some(status.as_u16()),
                    message: format!("expected a JSON object from the risk API, got {other}"),
                }),
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_risk_url() {
            let api = HttpRiskApi::new("https://risk.example.com/v1/").unwrap();
            assert_eq!(
                api.risk_url("ACME-001").as_str(),
                "https://risk.example.com/v1/companies/ACME-001/risk"
            );
        }

        #[test]
        fn test_risk_url_escapes_company_id() {
            let api = HttpRiskApi::new("https://risk.example.com").unwrap();
            assert_eq!(
                api.risk_url("a/b c").as_str(),
                "https://risk.example.com/companies/a%2Fb%20c/risk"
            );
        }

        #[test]
        fn test_invalid_base_url() {
            let err = HttpRiskApi::new("not a url").unwrap_err();
            assert!(matches!(err, IntakeflowError::Config(_)));
            assert!(HttpRiskApi::new("mailto:risk@example.com").is_err());
        }

        #[tokio::test]
        async fn test_unreachable_host_is_retriable() {
            let api = HttpRiskApi::with_timeout("http://127.0.0.1:9", Duration::from_millis(200))
                .unwrap();
            let err = api.fetch("ACME-001").await.unwrap_err();
            assert!(matches!(
                err,
                RiskApiError::Timeout { .. } | RiskApiError::ServerTransient { .. }
            ));
        }
    }
}
