//! Metadata relay - the monitoring function
//!
//! A small service that runs with the monitoring service account. It takes a
//! `metadata` selector, appends it to the service-account metadata path and
//! returns whatever the metadata server answers. The selector is never
//! checked, so `email` yields the account address and `token` yields a live
//! access token.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use crate::broker::DEFAULT_SELECTOR;
use crate::config::MonitorConfig;

/// Header the metadata server requires on every request
pub const METADATA_FLAVOR: (&str, &str) = ("Metadata-Flavor", "Google");

/// Relay errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum RelayError {
    #[error("Network error: {0}")]
    Network(String),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (StatusCode::BAD_GATEWAY, Json(body)).into_response()
    }
}

/// A metadata attribute as served upstream
#[derive(Debug, Clone)]
pub struct MetadataValue {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

pub struct MetadataRelay {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl MetadataRelay {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            timeout,
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(config.metadata_url.clone(), config.timeout())
    }

    /// URL the selector resolves to
    pub fn attribute_url(&self, selector: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), selector)
    }

    pub async fn fetch(&self, selector: &str) -> Result<MetadataValue, RelayError> {
        let url = self.attribute_url(selector);

        let response = self
            .client
            .get(&url)
            .header(METADATA_FLAVOR.0, METADATA_FLAVOR.1)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Metadata server unreachable");
                RelayError::Network(e.to_string())
            })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| RelayError::Network(e.to_string()))?;

        info!(status, "Metadata attribute served");
        Ok(MetadataValue {
            status,
            content_type,
            body,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RelayRequest {
    #[serde(default)]
    pub metadata: Option<String>,
}

/// POST / - look up the requested attribute
async fn relay_attribute(
    State(relay): State<Arc<MetadataRelay>>,
    body: Option<Json<RelayRequest>>,
) -> Result<Response, RelayError> {
    let selector = body
        .and_then(|Json(req)| req.metadata)
        .unwrap_or_else(|| DEFAULT_SELECTOR.to_string());

    let value = relay.fetch(&selector).await?;
    let status = StatusCode::from_u16(value.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = value
        .content_type
        .unwrap_or_else(|| "text/plain".to_string());

    Ok((status, [(header::CONTENT_TYPE, content_type)], value.body).into_response())
}

/// Create the relay router
pub fn create_router(relay: Arc<MetadataRelay>) -> Router {
    Router::new()
        .route("/", post(relay_attribute))
        .route("/health", get(|| async { "OK" }))
        .with_state(relay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SA_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default";

    async fn metadata_stub() -> MockServer {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("{}/email", SA_PATH)))
            .and(header_eq("Metadata-Flavor", "Google"))
            .respond_with(ResponseTemplate::new(200).set_body_string("monitor@range.iam"))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("{}/token", SA_PATH)))
            .and(header_eq("Metadata-Flavor", "Google"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ya29.monitor-token"))
            .mount(&server)
            .await;

        server
    }

    #[test]
    fn test_attribute_url() {
        let relay = MetadataRelay::new("http://md/sa/default/", Duration::from_secs(1));
        assert_eq!(relay.attribute_url("token"), "http://md/sa/default/token");
        assert_eq!(
            relay.attribute_url("token?scopes=cloud-platform"),
            "http://md/sa/default/token?scopes=cloud-platform"
        );
    }

    #[tokio::test]
    async fn test_selector_picks_attribute() {
        let server = metadata_stub().await;
        let relay = MetadataRelay::new(
            format!("{}{}", server.uri(), SA_PATH),
            Duration::from_secs(5),
        );

        assert_eq!(relay.fetch("email").await.unwrap().body, "monitor@range.iam");
        assert_eq!(relay.fetch("token").await.unwrap().body, "ya29.monitor-token");
    }

    #[tokio::test]
    async fn test_unknown_attribute_passes_status_through() {
        let server = metadata_stub().await;
        let relay = MetadataRelay::new(
            format!("{}{}", server.uri(), SA_PATH),
            Duration::from_secs(5),
        );

        assert_eq!(relay.fetch("identity").await.unwrap().status, 404);
    }

    #[tokio::test]
    async fn test_unreachable_metadata_server() {
        let relay = MetadataRelay::new("http://127.0.0.1:1/sa", Duration::from_secs(2));
        assert!(matches!(
            relay.fetch("token").await,
            Err(RelayError::Network(_))
        ));
    }
}
