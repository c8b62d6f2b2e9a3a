//! Portal HTTP routes
//!
//! Handlers for the module pages, flag submission and the escalation chain

use std::collections::BTreeMap;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{
    content::{self, Deployment, KeyAccess, ModelListing},
    SharedState,
};
use crate::broker::DEFAULT_SELECTOR;
use crate::error::PortalError;
use crate::impersonation::{DecisionBody, ServiceAccount};
use crate::progress::{MODULES, PAGED_MODULES};

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    "OK"
}

#[derive(Serialize)]
pub struct ModuleSummary {
    pub num: u32,
    pub name: &'static str,
    pub unlocked: bool,
}

#[derive(Serialize)]
pub struct IndexResponse {
    pub project_id: String,
    pub region: String,
    pub modules: Vec<ModuleSummary>,
}

/// GET / - landing page
pub async fn index(State(state): State<SharedState>) -> Json<IndexResponse> {
    let snapshot = state.store.snapshot();
    Json(IndexResponse {
        project_id: state.config.server.project_id.clone(),
        region: state.config.server.region.clone(),
        modules: MODULES
            .iter()
            .map(|m| ModuleSummary {
                num: m.num,
                name: m.name,
                unlocked: snapshot.get(&m.num).copied().unwrap_or(false),
            })
            .collect(),
    })
}

/// GET /docs - module 1 entry point
pub async fn docs(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let server = &state.config.server;
    Json(json!({
        "project_id": server.project_id,
        "region": server.region,
        "api_endpoint": content::api_endpoint(&server.project_id, &server.region),
    }))
}

fn api_key(headers: &HeaderMap) -> &str {
    headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// GET /api/v1/models
pub async fn list_models(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Json<ModelListing> {
    let keys = &state.config.api_keys;
    let access = KeyAccess::resolve(api_key(&headers), &keys.api_key, &keys.admin_key);
    Json(ModelListing::for_access(access))
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub text: String,
}

/// POST /api/v1/predict
///
/// The key is checked before the body is looked at.
pub async fn predict(
    headers: HeaderMap,
    body: Option<Json<PredictRequest>>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    if api_key(&headers).is_empty() {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "API key required" })),
        ));
    }
    let Some(Json(req)) = body else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Expected a JSON body" })),
        ));
    };

    Ok(Json(json!({
        "model": req.model.unwrap_or_else(|| "sentiment-v1".to_string()),
        "prediction": content::sentiment(&req.text),
        "confidence": 0.85,
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct FlagForm {
    #[serde(default)]
    pub flag: String,
}

/// POST /submit-flag
///
/// A missing or unreadable form body counts as an empty submission.
pub async fn submit_flag(
    State(state): State<SharedState>,
    form: Option<Form<FlagForm>>,
) -> Result<Response, PortalError> {
    let form = form.map(|Form(f)| f).unwrap_or_default();
    let outcome = state.validator.validate(&form.flag)?;
    let status = if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    Ok((status, Json(outcome)).into_response())
}

/// GET /progress - `module1`..`module4`
pub async fn progress(State(state): State<SharedState>) -> Json<BTreeMap<String, bool>> {
    Json(
        state
            .store
            .snapshot()
            .into_iter()
            .filter(|(num, _)| *num <= PAGED_MODULES)
            .map(|(num, unlocked)| (format!("module{}", num), unlocked))
            .collect(),
    )
}

#[derive(Serialize)]
pub struct StatusPage {
    pub project_id: String,
    pub deployments: Vec<Deployment>,
}

/// GET /status - module 2
pub async fn status_page(State(state): State<SharedState>) -> Response {
    state
        .guard
        .guard(2, || {
            let project_id = &state.config.server.project_id;
            Json(StatusPage {
                project_id: project_id.clone(),
                deployments: content::deployments(project_id),
            })
        })
        .into_response()
}

/// GET /monitoring - module 3
pub async fn monitoring_page(State(state): State<SharedState>) -> Response {
    state
        .guard
        .guard(3, || {
            Json(json!({
                "project_id": state.config.server.project_id,
                "region": state.config.server.region,
                "monitoring_configured": state.broker.is_configured(),
            }))
        })
        .into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct MonitoringCheckForm {
    #[serde(default)]
    pub metadata: Option<String>,
}

/// POST /monitoring/check - relay a metadata selector to the monitoring function
pub async fn monitoring_check(
    State(state): State<SharedState>,
    form: Option<Form<MonitoringCheckForm>>,
) -> Result<Response, PortalError> {
    let selector = form
        .and_then(|Form(f)| f.metadata)
        .unwrap_or_else(|| DEFAULT_SELECTOR.to_string());

    let credential = state.broker.fetch_credential(&selector).await?;
    let content_type = credential
        .content_type
        .unwrap_or_else(|| "application/json".to_string());

    Ok(([(header::CONTENT_TYPE, content_type)], credential.body).into_response())
}

#[derive(Serialize)]
pub struct AdminConsole {
    pub project_id: String,
    pub service_accounts: Vec<ServiceAccount>,
    pub token_preview: String,
}

pub const ADMIN_LOGIN_HINT: &str = "Use the token obtained from the monitoring function";

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.replace("Bearer ", "");
    (!token.is_empty()).then_some(token)
}

/// GET /admin - module 4
pub async fn admin_console(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    state
        .guard
        .guard(4, || match bearer_token(&headers) {
            None => PortalError::AuthRequired {
                hint: ADMIN_LOGIN_HINT.to_string(),
            }
            .into_response(),
            Some(token) => Json(AdminConsole {
                project_id: state.config.server.project_id.clone(),
                service_accounts: state.capabilities.accounts().to_vec(),
                token_preview: content::token_preview(&token),
            })
            .into_response(),
        })
        .into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct PermissionForm {
    #[serde(default)]
    pub service_account: String,
    #[serde(default)]
    pub target: String,
}

/// POST /admin/test-permissions
pub async fn check_permissions(
    State(state): State<SharedState>,
    form: Option<Form<PermissionForm>>,
) -> Json<DecisionBody> {
    let form = form.map(|Form(f)| f).unwrap_or_default();
    Json(
        state
            .capabilities
            .evaluate(&form.service_account, &form.target)
            .into(),
    )
}
