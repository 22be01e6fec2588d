//! Read-only REST endpoints over the registration store.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::error::{ConfigError, DatabaseError};
use crate::store::{RegistrationRecord, RegistrationStore};

/// Shared state for the reporting routes.
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn RegistrationStore>,
}

/// Name and phone only, as listed by `GET /users`.
#[derive(Debug, Serialize)]
struct UserSummary {
    name: String,
    phone: String,
}

impl From<RegistrationRecord> for UserSummary {
    fn from(record: RegistrationRecord) -> Self {
        Self {
            name: record.name,
            phone: record.phone,
        }
    }
}

fn store_failure(e: DatabaseError) -> Response {
    tracing::error!("Reporting query failed: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"error": e.to_string()})),
    )
        .into_response()
}

/// GET /
async fn status() -> impl IntoResponse {
    Json(serde_json::json!({"status": "Bot is running"}))
}

/// GET /users
///
/// Every registered user's name and phone, oldest registration first.
async fn list_users(State(state): State<ApiState>) -> Response {
    match state.store.list_registrations().await {
        Ok(records) => {
            let users: Vec<UserSummary> = records.into_iter().map(UserSummary::from).collect();
            Json(serde_json::json!({"users": users})).into_response()
        }
        Err(e) => store_failure(e),
    }
}

/// GET /api/registrations
///
/// Full records with their count.
async fn list_registrations(State(state): State<ApiState>) -> Response {
    match state.store.list_registrations().await {
        Ok(records) => {
            let count = records.len();
            Json(serde_json::json!({"registrations": records, "count": count})).into_response()
        }
        Err(e) => store_failure(e),
    }
}

/// CORS layer for `origin`; `*` allows any origin.
pub fn cors_layer(origin: &str) -> Result<CorsLayer, ConfigError> {
    let allow_origin = if origin.trim() == "*" {
        AllowOrigin::from(Any)
    } else {
        let value = HeaderValue::from_str(origin.trim()).map_err(|e| ConfigError::InvalidValue {
            key: "SIGNUP_CORS_ORIGIN".into(),
            message: format!("{origin:?}: {e}"),
        })?;
        AllowOrigin::exact(value)
    };

    Ok(CorsLayer::new().allow_origin(allow_origin).allow_methods(Any).allow_headers(Any))
}

/// Build the reporting routes.
pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/users", get(list_users))
        .route("/api/registrations", get(list_registrations))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::dialog::UserId;
    use crate::store::LibSqlBackend;

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn seeded_app() -> Router {
        let store = LibSqlBackend::new_memory().await.unwrap();
        store
            .register_if_absent(&RegistrationRecord::new(1, "Abebe Kebede", "+251911000000"))
            .await
            .unwrap();
        store
            .register_if_absent(&RegistrationRecord::new(2, "Sara Tesfaye", "0912345678"))
            .await
            .unwrap();
        api_routes(ApiState {
            store: Arc::new(store),
        })
    }

    struct BrokenStore;

    #[async_trait]
    impl RegistrationStore for BrokenStore {
        async fn init_schema(&self) -> Result<(), DatabaseError> {
            Ok(())
        }
        async fn registration_exists(&self, _: UserId) -> Result<bool, DatabaseError> {
            Err(DatabaseError::Query("offline".into()))
        }
        async fn register_if_absent(&self, _: &RegistrationRecord) -> Result<bool, DatabaseError> {
            Err(DatabaseError::Query("offline".into()))
        }
        async fn list_registrations(&self) -> Result<Vec<RegistrationRecord>, DatabaseError> {
            Err(DatabaseError::Query("offline".into()))
        }
        async fn count_registrations(&self) -> Result<usize, DatabaseError> {
            Err(DatabaseError::Query("offline".into()))
        }
    }

    #[tokio::test]
    async fn root_reports_running() {
        let (status, body) = get_json(seeded_app().await, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"status": "Bot is running"}));
    }

    #[tokio::test]
    async fn users_lists_name_and_phone_only() {
        let (status, body) = get_json(seeded_app().await, "/users").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!({"users": [
                {"name": "Abebe Kebede", "phone": "+251911000000"},
                {"name": "Sara Tesfaye", "phone": "0912345678"},
            ]})
        );
    }

    #[tokio::test]
    async fn registrations_include_count_and_ids() {
        let (status, body) = get_json(seeded_app().await, "/api/registrations").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert_eq!(body["registrations"][0]["user_id"], 1);
        assert!(body["registrations"][1]["registered_at"].is_string());
    }

    #[tokio::test]
    async fn store_failure_is_500() {
        let app = api_routes(ApiState {
            store: Arc::new(BrokenStore),
        });
        let (status, body) = get_json(app, "/users").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("offline"));
    }

    #[test]
    fn cors_origin_validation() {
        assert!(cors_layer("*").is_ok());
        assert!(cors_layer("https://example.org").is_ok());
        assert!(cors_layer("bad\norigin").is_err());
    }
}
