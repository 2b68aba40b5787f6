pub mod api;
pub mod gateway;
pub mod retry;
pub mod store;

pub use api::ApiError;
pub use gateway::GatewayError;
pub use retry::RetryError;
pub use store::StoreError;

use axum::Json;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use uuid::Uuid;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let (error_message, error_id) = match &self {
            ApiError::InternalError(e) => {
                let error_id = Uuid::new_v4();
                tracing::error!(error_id = ?error_id, "Internal error: {}", e);
                ("Internal server error".to_string(), Some(error_id.to_string()))
            }
            other => (other.to_string(), None),
        };

        let mut error_obj = json!({
            "code": status.as_u16(),
            "message": error_message
        });

        if let Some(error_id) = error_id {
            error_obj["error_id"] = json!(error_id);
        }

        (status, Json(json!({ "error": error_obj }))).into_response()
    }
}
