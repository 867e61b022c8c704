use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};

/// Wraps API bodies as `{"success": true, "data": ...}` or `{"success": false, "error": ...}`.
/// Bodies that already carry a `success` key pass through untouched.
pub async fn wrap_response_middleware(req: Request, next: Next) -> Result<Response, StatusCode> {
    let res = next.run(req).await;
    let status = res.status();

    let is_json = res
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .map_or(false, |ct| ct.contains("application/json"));

    let (mut parts, body) = res.into_parts();
    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => return Err(StatusCode::INTERNAL_SERVER_ERROR),
    };

    let wrapped = if is_json {
        let data: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        match data.as_object() {
            Some(obj) if obj.contains_key("success") => data,
            _ if status.is_success() => json!({ "success": true, "data": data }),
            _ => {
                let message = data
                    .as_str()
                    .or_else(|| data.get("error").and_then(|v| v.as_str()))
                    .map(str::to_string)
                    .unwrap_or_else(|| status.to_string());
                json!({ "success": false, "error": message })
            }
        }
    } else if status.is_success() {
        if bytes.is_empty() {
            json!({ "success": true, "data": null })
        } else {
            json!({ "success": true, "data": String::from_utf8_lossy(&bytes) })
        }
    } else {
        // Extractor rejections arrive as plain text.
        let msg = String::from_utf8_lossy(&bytes).to_string();
        json!({
            "success": false,
            "error": if msg.is_empty() { status.to_string() } else { msg }
        })
    };

    let new_bytes = serde_json::to_vec(&wrapped).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    parts
        .headers
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    parts.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(new_bytes.len()));

    Ok(Response::from_parts(parts, Body::from(new_bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::get, Json, Router};
    use tower::ServiceExt;

    async fn body_json(res: Response) -> Value {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn app() -> Router {
        Router::new()
            .route("/data", get(|| async { Json(json!({ "id": 1 })) }))
            .route(
                "/missing",
                get(|| async { (StatusCode::NOT_FOUND, "no such thing") }),
            )
            .route(
                "/already",
                get(|| async { Json(json!({ "success": false, "error": "x" })) }),
            )
            .layer(middleware::from_fn(wrap_response_middleware))
    }

    async fn get_path(path: &str) -> Response {
        app()
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_success_is_wrapped() {
        let res = get_path("/data").await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            body_json(res).await,
            json!({ "success": true, "data": { "id": 1 } })
        );
    }

    #[tokio::test]
    async fn test_plain_text_error_is_wrapped() {
        let res = get_path("/missing").await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(res).await,
            json!({ "success": false, "error": "no such thing" })
        );
    }

    #[tokio::test]
    async fn test_standardized_body_passes_through() {
        let res = get_path("/already").await;
        assert_eq!(
            body_json(res).await,
            json!({ "success": false, "error": "x" })
        );
    }
}
