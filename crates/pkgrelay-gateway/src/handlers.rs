// SPDX-FileCopyrightText: 2026 pkgrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway.
//!
//! Handles POST /v1/packages, GET /v1/packages/{name}, GET /health and
//! GET /metrics.

use std::collections::BTreeMap;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use pkgrelay_core::{
    HealthStatus, Outcome, Package, PackageEvent, PackageRequest, PluginAdapter, RelayError,
};

use crate::server::GatewayState;

/// Request body for POST /v1/packages.
///
/// Every field is optional at the wire level so that a missing field can be
/// reported by name instead of as a generic decoding error.
#[derive(Debug, Default, Deserialize)]
pub struct CreatePackageBody {
    #[serde(default)]
    pub package_type: Option<String>,
    #[serde(default)]
    pub package_name: Option<String>,
    #[serde(default)]
    pub destination_url: Option<String>,
    #[serde(default)]
    pub receiver_is_hub: bool,
    #[serde(default)]
    pub receiver_operator_id: Option<String>,
    #[serde(default)]
    pub sender_operator_id: Option<String>,
    /// Package description as JSON. A JSON string is taken as encoded JSON text.
    #[serde(default)]
    pub description: Option<serde_json::Value>,
    #[serde(default)]
    pub reprocess: bool,
}

fn required(field: &'static str, value: Option<String>) -> Result<String, String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(format!("missing `{field}`")),
    }
}

impl CreatePackageBody {
    /// Validate mandatory fields and build the pipeline request.
    pub fn into_request(self) -> Result<PackageRequest, String> {
        let package_type = required("package_type", self.package_type)?;
        let package_name = required("package_name", self.package_name)?;
        let destination_url = required("destination_url", self.destination_url)?;
        let receiver_operator_id = required("receiver_operator_id", self.receiver_operator_id)?;
        let sender_operator_id = required("sender_operator_id", self.sender_operator_id)?;
        let description = match self.description {
            None | Some(serde_json::Value::Null) => Vec::new(),
            Some(serde_json::Value::String(text)) => text.into_bytes(),
            Some(other) => other.to_string().into_bytes(),
        };
        if description.is_empty() {
            return Err("missing `description`".to_string());
        }

        Ok(PackageRequest {
            package_type,
            package_name,
            destination_url,
            receiver_is_hub: self.receiver_is_hub,
            receiver_operator_id,
            sender_operator_id,
            description,
            reprocess: self.reprocess,
        })
    }
}

/// Response body for a processed package.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatePackageResponse {
    pub status: bool,
}

/// Response body for GET /v1/packages/{name}.
#[derive(Debug, Serialize, Deserialize)]
pub struct PackageView {
    pub package: Package,
    pub events: Vec<PackageEvent>,
}

/// Response body for GET /health.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Adapter name to its reported state.
    pub components: BTreeMap<String, String>,
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

/// POST /v1/packages
///
/// Runs the package through the pipeline and maps the outcome: 200 on
/// success, 500 when retrying cannot help, 503 when it can.
pub async fn post_package(
    State(state): State<GatewayState>,
    body: Result<Json<CreatePackageBody>, JsonRejection>,
) -> Response {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    let request = match body.into_request() {
        Ok(request) => request,
        Err(reason) => return error_response(StatusCode::BAD_REQUEST, reason),
    };

    pkgrelay_prometheus::record_package("api");
    tracing::debug!(package = %request.package_name, "package received over HTTP");

    let outcome = state
        .orchestrator
        .process_package(&request, &state.shutdown.child_token())
        .await;

    match outcome {
        Outcome::Success => {
            (StatusCode::OK, Json(CreatePackageResponse { status: true })).into_response()
        }
        Outcome::FatalFailure(failure) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to process package {}: {failure}", request.package_name),
        ),
        Outcome::TemporaryFailure(failure) => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            format!("failed to process package {}: {failure}", request.package_name),
        ),
    }
}

/// GET /v1/packages/{name}
pub async fn get_package(
    State(state): State<GatewayState>,
    Path(name): Path<String>,
) -> Response {
    let lookup = async {
        let Some(package) = state.store.find_by_name(&name).await? else {
            return Ok::<_, RelayError>(None);
        };
        let events = state.store.list_events(package.id).await?;
        Ok(Some(PackageView { package, events }))
    };

    match lookup.await {
        Ok(Some(view)) => (StatusCode::OK, Json(view)).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("package {name} not found")),
        Err(e) => {
            tracing::error!(package = %name, error = %e, "package lookup failed");
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

async fn probe(adapter: &(impl PluginAdapter + ?Sized)) -> (String, Result<HealthStatus, RelayError>) {
    (adapter.name().to_string(), adapter.health_check().await)
}

/// GET /health
///
/// Probes the store, blob store and publisher concurrently. Any unhealthy or
/// failing component turns the response into 503. Degraded components are
/// reported but keep the service up.
pub async fn get_health(State(state): State<GatewayState>) -> Response {
    let (store, blobs, publisher) = futures::join!(
        probe(state.store.as_ref()),
        probe(state.blobs.as_ref()),
        probe(state.publisher.as_ref()),
    );

    let mut healthy = true;
    let mut components = BTreeMap::new();
    for (name, result) in [store, blobs, publisher] {
        let (up, report) = match result {
            Ok(HealthStatus::Healthy) => (true, "healthy".to_string()),
            Ok(HealthStatus::Degraded(reason)) => (true, format!("degraded: {reason}")),
            Ok(HealthStatus::Unhealthy(reason)) => (false, format!("unhealthy: {reason}")),
            Err(e) => (false, format!("unhealthy: {e}")),
        };
        if !up {
            tracing::warn!(component = %name, state = %report, "health probe failed");
            healthy = false;
        }
        components.insert(name, report);
    }

    let response = HealthResponse {
        status: if healthy { "ok" } else { "unavailable" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        components,
    };
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response)).into_response()
}

/// GET /metrics
pub async fn get_metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => error_response(StatusCode::NOT_FOUND, "metrics exporter disabled"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(json: &str) -> CreatePackageBody {
        serde_json::from_str(json).unwrap()
    }

    const FULL: &str = r#"{
        "package_type": "messages",
        "package_name": "msg-1",
        "destination_url": "https://hub.example/in",
        "receiver_operator_id": "R",
        "sender_operator_id": "S",
        "description": [{"message_id": "m1", "files": ["a.txt"], "description": {}}]
    }"#;

    #[test]
    fn full_body_becomes_request() {
        let req = body(FULL).into_request().unwrap();
        assert_eq!(req.package_type, "messages");
        assert!(!req.receiver_is_hub);
        assert!(!req.reprocess);
        let description: serde_json::Value = serde_json::from_slice(&req.description).unwrap();
        assert_eq!(description[0]["message_id"], "m1");
    }

    #[test]
    fn each_mandatory_field_is_named_when_missing() {
        for field in [
            "package_type",
            "package_name",
            "destination_url",
            "receiver_operator_id",
            "sender_operator_id",
            "description",
        ] {
            let mut value: serde_json::Value = serde_json::from_str(FULL).unwrap();
            value.as_object_mut().unwrap().remove(field);
            let err = body(&value.to_string()).into_request().unwrap_err();
            assert_eq!(err, format!("missing `{field}`"));
        }
    }

    #[test]
    fn blank_strings_count_as_missing() {
        let mut value: serde_json::Value = serde_json::from_str(FULL).unwrap();
        value["package_name"] = serde_json::json!("   ");
        value["description"] = serde_json::json!("");
        let err = body(&value.to_string()).into_request().unwrap_err();
        assert_eq!(err, "missing `package_name`");

        value["package_name"] = serde_json::json!("msg-1");
        let err = body(&value.to_string()).into_request().unwrap_err();
        assert_eq!(err, "missing `description`");
    }

    #[test]
    fn health_response_serializes() {
        let resp = HealthResponse {
            status: "ok".to_string(),
            version: "0.1.0".to_string(),
            uptime_secs: 42,
            components: BTreeMap::from([("sqlite".to_string(), "healthy".to_string())]),
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(json.contains("\"uptime_secs\":42"));
        assert!(json.contains("\"sqlite\":\"healthy\""));
    }
}
