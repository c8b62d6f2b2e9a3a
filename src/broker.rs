//! Identity broker
//!
//! Relays a caller-chosen metadata selector to the monitoring function and
//! hands back whatever it answers. The selector is forwarded as-is: there is
//! no check on which selectors a caller may ask for, so naming the token
//! attribute returns the elevated credential through exactly the same path
//! as the default `email` lookup. This leak is the point of module 3 and
//! must stay.

use std::time::Duration;

use reqwest::{header, Client};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::BrokerConfig;
use crate::error::{PortalError, Result};

/// Selector used when the caller does not name one
pub const DEFAULT_SELECTOR: &str = "email";

/// Body posted to the monitoring function
#[derive(Debug, Serialize)]
struct MetadataRequest<'a> {
    metadata: &'a str,
}

/// Opaque credential relayed from upstream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Response body, untouched
    pub body: String,
    /// Upstream content type, if it sent one
    pub content_type: Option<String>,
    /// Upstream HTTP status
    pub status: u16,
}

pub struct IdentityBroker {
    client: Client,
    endpoint: Option<String>,
    identity_token: Option<String>,
    timeout: Duration,
}

impl IdentityBroker {
    pub fn new(endpoint: Option<String>, identity_token: Option<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            identity_token,
            timeout,
        }
    }

    pub fn from_config(config: &BrokerConfig) -> Self {
        Self::new(
            config.monitoring_function_url.clone(),
            config.identity_token.clone(),
            config.timeout(),
        )
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Fetch the credential attribute named by `selector`.
    ///
    /// One attempt, bounded by the configured timeout.
    pub async fn fetch_credential(&self, selector: &str) -> Result<Credential> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or(PortalError::UpstreamUnavailable)?;

        let mut request = self
            .client
            .post(endpoint)
            .json(&MetadataRequest { metadata: selector })
            .timeout(self.timeout);

        if let Some(token) = &self.identity_token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "Monitoring function unreachable");
            PortalError::Upstream { details: e.to_string() }
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Monitoring function returned an error status");
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.text().await.map_err(|e| {
            warn!(error = %e, "Failed to read monitoring function response");
            PortalError::Upstream { details: e.to_string() }
        })?;

        info!(status = status.as_u16(), bytes = body.len(), "Credential relayed");

        Ok(Credential {
            body,
            content_type,
            status: status.as_u16(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn monitoring_stub() -> MockServer {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_json(json!({ "metadata": "email" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("monitoring-function@range.iam.gserviceaccount.com"),
            )
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_json(json!({ "metadata": "token" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.elevated-fixture",
                "expires_in": 3599,
                "token_type": "Bearer",
            })))
            .mount(&server)
            .await;

        server
    }

    fn broker_for(server: &MockServer) -> IdentityBroker {
        IdentityBroker::new(Some(format!("{}/", server.uri())), None, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_default_selector_returns_default_tier() {
        let server = monitoring_stub().await;
        let broker = broker_for(&server);

        let credential = broker.fetch_credential(DEFAULT_SELECTOR).await.unwrap();
        assert_eq!(credential.body, "monitoring-function@range.iam.gserviceaccount.com");
        assert_eq!(credential.status, 200);
    }

    #[tokio::test]
    async fn test_token_selector_returns_elevated_tier() {
        let server = monitoring_stub().await;
        let broker = broker_for(&server);

        let credential = broker.fetch_credential("token").await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&credential.body).unwrap();
        assert_eq!(parsed["access_token"], "ya29.elevated-fixture");
        assert_eq!(credential.content_type.as_deref(), Some("application/json"));
    }

    #[tokio::test]
    async fn test_unconfigured_broker_makes_no_call() {
        let broker = IdentityBroker::new(None, None, Duration::from_secs(5));
        assert!(!broker.is_configured());
        assert!(matches!(
            broker.fetch_credential("token").await,
            Err(PortalError::UpstreamUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_identity_token_sent_as_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header_eq("authorization", "Bearer portal-identity"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let broker = IdentityBroker::new(
            Some(server.uri()),
            Some("portal-identity".to_string()),
            Duration::from_secs(5),
        );
        assert_eq!(broker.fetch_credential("email").await.unwrap().body, "ok");
    }

    #[tokio::test]
    async fn test_timeout_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let broker =
            IdentityBroker::new(Some(server.uri()), None, Duration::from_millis(200));
        let started = std::time::Instant::now();

        assert!(matches!(
            broker.fetch_credential("token").await,
            Err(PortalError::Upstream { .. })
        ));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_transport_failure_is_upstream_error() {
        // Nothing listens on port 1
        let broker = IdentityBroker::new(
            Some("http://127.0.0.1:1/".to_string()),
            None,
            Duration::from_secs(2),
        );
        assert!(matches!(
            broker.fetch_credential("email").await,
            Err(PortalError::Upstream { .. })
        ));
    }

    #[tokio::test]
    async fn test_error_status_relayed_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such attribute"))
            .mount(&server)
            .await;

        let broker = broker_for(&server);
        let credential = broker.fetch_credential("bogus").await.unwrap();
        assert_eq!(credential.status, 404);
        assert_eq!(credential.body, "no such attribute");
    }
}
