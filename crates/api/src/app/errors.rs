use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value, json};

use antibiostock_core::StockError;

const INTERNAL_MESSAGE: &str = "internal server error";

/// Map a domain error onto its HTTP status and JSON body.
///
/// Bodies are `{ "ok": false, "error": <readable text>, "code": <stable code> }`
/// plus the extra fields below.
///
/// | Variant              | Status | Extra fields             |
/// |----------------------|--------|--------------------------|
/// | `Validation`         | 400    |                          |
/// | `NotFound`           | 404    |                          |
/// | `InsufficientStock`  | 409    | `shortfalls`, `item`*    |
/// | `NoLinkedItems`      | 400    | `panel_id`               |
/// | `DanglingReference`  | 409    | `panel_id`, `missing`    |
/// | `Internal`           | 500    |                          |
///
/// *`item` carries the current row when exactly one item fell short.
pub fn stock_error_to_response(err: StockError) -> Response {
    let code = err.code();
    match err {
        StockError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, code, msg),
        StockError::NotFound(_) => json_error(StatusCode::NOT_FOUND, code, err.to_string()),
        StockError::InsufficientStock(ref shortfalls) => {
            let mut extra = Map::new();
            if let [single] = shortfalls.as_slice() {
                extra.insert("item".into(), json!(single.item));
            }
            extra.insert("shortfalls".into(), json!(shortfalls));
            json_error_with(StatusCode::CONFLICT, code, err.to_string(), extra)
        }
        StockError::NoLinkedItems(panel_id) => {
            let mut extra = Map::new();
            extra.insert("panel_id".into(), json!(panel_id));
            json_error_with(StatusCode::BAD_REQUEST, code, err.to_string(), extra)
        }
        StockError::DanglingReference {
            panel_id,
            ref missing,
        } => {
            let mut extra = Map::new();
            extra.insert("panel_id".into(), json!(panel_id));
            extra.insert("missing".into(), json!(missing));
            json_error_with(StatusCode::CONFLICT, code, err.to_string(), extra)
        }
        StockError::Internal(detail) => {
            tracing::error!(error = %detail, "internal error");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, code, INTERNAL_MESSAGE)
        }
    }
}

/// Malformed or non-JSON bodies become the same 400 shape as validation errors.
pub fn json_rejection_to_response(rejection: JsonRejection) -> Response {
    json_error(
        StatusCode::BAD_REQUEST,
        "validation_error",
        rejection.body_text(),
    )
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    json_error_with(status, code, message, Map::new())
}

fn json_error_with(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    extra: Map<String, Value>,
) -> Response {
    let mut body = Map::new();
    body.insert("ok".into(), Value::Bool(false));
    body.insert("error".into(), Value::String(message.into()));
    body.insert("code".into(), Value::String(code.to_string()));
    body.extend(extra);

    (status, axum::Json(Value::Object(body))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use antibiostock_core::{Antibiotic, AntibioticCode, PanelId, Shortfall};

    fn status_of(err: StockError) -> StatusCode {
        stock_error_to_response(err).status()
    }

    async fn body_of(res: Response) -> Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn error_field_is_readable_and_code_is_stable() {
        let body = body_of(stock_error_to_response(StockError::validation(
            "quantity must be an integer >= 0",
        )))
        .await;
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"], "quantity must be an integer >= 0");
        assert_eq!(body["code"], "validation_error");

        let body = body_of(stock_error_to_response(StockError::internal("password=hunter2"))).await;
        assert_eq!(body["error"], "internal server error");
        assert_eq!(body["code"], "internal_error");
    }

    #[test]
    fn maps_every_variant_to_its_status() {
        let code = AntibioticCode::parse("AMX").unwrap();
        let panel = PanelId::new(1).unwrap();
        let item = Antibiotic::new(code.clone(), "Amoxicilina", 1, 0).unwrap();

        assert_eq!(status_of(StockError::validation("x")), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(StockError::not_found("antibiotic AMX")), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(StockError::InsufficientStock(vec![Shortfall::new(&item, 5)])),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(StockError::NoLinkedItems(panel)), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(StockError::DanglingReference {
                panel_id: panel,
                missing: vec![code],
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(StockError::internal("connection reset")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
