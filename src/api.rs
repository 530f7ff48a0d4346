// 🌐 HTTP API
// Stateless JSON routes over the CSV codec and the quote evaluation

use crate::csv_codec::{parse_text, serialize, CsvError};
use crate::quote::{handle_submission, SubmitError};
use crate::record::{Record, Scalar};
use crate::wizard::FormDraft;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

/// API Response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

impl IntoResponse for SubmitError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::BAD_REQUEST);
        (status, Json(self)).into_response()
    }
}

fn csv_failure(err: CsvError) -> Response {
    warn!(reason = %err, "csv request rejected");
    let body = Json(ApiResponse::<()>::failed(err.to_string()));
    (StatusCode::UNPROCESSABLE_ENTITY, body).into_response()
}

// ============================================================================
// Record <-> flat JSON object
// ============================================================================

/// `{"id": 17, "name": "Ada", "age": 36}`, columns in record order
pub fn record_to_json(record: &Record) -> Value {
    let mut object = Map::new();
    object.insert("id".to_string(), Value::from(record.id.0));
    for (column, value) in record.fields() {
        let json = match value {
            Scalar::Number(n) => {
                serde_json::Number::from_f64(*n).map_or(Value::Null, Value::Number)
            }
            Scalar::Text(s) => Value::String(s.clone()),
        };
        object.insert(column.clone(), json);
    }
    Value::Object(object)
}

/// Inverse of `record_to_json`; a fresh id is assigned and `id` is not a column
pub fn record_from_json(object: &Map<String, Value>) -> Record {
    Record::from_pairs(object.iter().filter(|(k, _)| k.as_str() != "id").map(|(k, v)| {
        let value = match v {
            Value::Number(n) => n
                .as_f64()
                .map_or_else(|| Scalar::Text(n.to_string()), Scalar::Number),
            Value::String(s) => Scalar::Text(s.clone()),
            Value::Null => Scalar::Text(String::new()),
            other => Scalar::Text(other.to_string()),
        };
        (k.clone(), value)
    }))
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/submit-form - Evaluate a finished wizard form
async fn submit_form(Json(draft): Json<FormDraft>) -> Response {
    match handle_submission(&draft) {
        Ok(ack) => (StatusCode::OK, Json(ack)).into_response(),
        Err(err) => {
            warn!(status = err.status, reason = %err.error, "form rejected");
            err.into_response()
        }
    }
}

/// POST /api/csv/parse - CSV text in, records out
async fn parse_csv(body: String) -> Response {
    match parse_text(&body) {
        Ok(records) => {
            info!(rows = records.len(), "parsed csv request");
            let data: Vec<Value> = records.iter().map(record_to_json).collect();
            (StatusCode::OK, Json(ApiResponse::ok(data))).into_response()
        }
        Err(err) => csv_failure(err),
    }
}

/// POST /api/csv/export - records in, CSV text out
async fn export_csv(Json(rows): Json<Vec<Map<String, Value>>>) -> Response {
    let records: Vec<Record> = rows.iter().map(record_from_json).collect();
    match serialize(&records) {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
            text,
        )
            .into_response(),
        Err(err) => csv_failure(err),
    }
}

/// Routes mounted under `/api`
pub fn router() -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/submit-form", post(submit_form))
        .route("/csv/parse", post(parse_csv))
        .route("/csv/export", post(export_csv));

    Router::new().nest("/api", api_routes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::tests::{business_step1, business_step2, business_step3};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn call(request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = router().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(Request::get("/api/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["data"], "OK");
    }

    #[tokio::test]
    async fn test_submit_complete_form() {
        let draft = FormDraft {
            step1: Some(business_step1()),
            step2: Some(business_step2()),
            step3: Some(business_step3()),
        };
        let request = post_json("/api/submit-form", serde_json::to_value(&draft).unwrap());
        let (status, body) = call(request).await;

        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["estimatedCost"], 448.5);
        assert_eq!(json["data"]["userType"], "business");
    }

    #[tokio::test]
    async fn test_submit_missing_step() {
        let draft = FormDraft {
            step1: Some(business_step1()),
            ..FormDraft::default()
        };
        let request = post_json("/api/submit-form", serde_json::to_value(&draft).unwrap());
        let (status, body) = call(request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "form data is incomplete");
    }

    #[tokio::test]
    async fn test_parse_csv() {
        let request = Request::post("/api/csv/parse")
            .body(Body::from("name,age\nAda,36\nBob,x"))
            .unwrap();
        let (status, body) = call(request).await;

        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        let rows = json["data"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["age"], 36.0);
        assert_eq!(rows[1]["age"], "x");
    }

    #[tokio::test]
    async fn test_parse_csv_with_byte_order_mark() {
        let request = Request::post("/api/csv/parse")
            .body(Body::from("\u{feff}name,age\nAda,36"))
            .unwrap();
        let (status, body) = call(request).await;

        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["data"][0]["name"], "Ada");
    }

    #[tokio::test]
    async fn test_parse_empty_csv() {
        let request = Request::post("/api/csv/parse").body(Body::from("  ")).unwrap();
        let (status, body) = call(request).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "document is empty");
    }

    #[tokio::test]
    async fn test_export_csv_keeps_column_order() {
        let rows = serde_json::json!([
            {"id": 1, "name": "Ada", "age": 36},
            {"id": 2, "name": "Grace, Hopper", "age": 45},
        ]);
        let (status, body) = call(post_json("/api/csv/export", rows)).await;

        assert_eq!(status, StatusCode::OK);
        let text = String::from_utf8(body).unwrap();
        assert_eq!(text, "name,age\nAda,36\n\"Grace, Hopper\",45");
    }

    #[tokio::test]
    async fn test_export_nothing() {
        let (status, _) = call(post_json("/api/csv/export", serde_json::json!([]))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
