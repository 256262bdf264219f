//! Request handlers.

use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use url::Url;

use super::error::ApiError;
use super::AppState;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::ingest::{self, SIGNATURE_HEADER};
use crate::render;
use crate::storage::AppendOutcome;
use crate::view::SheetLayout;

const ARTIFACT_CACHE: &str = "public, max-age=3600";

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Compare the supplied secret with the configured one.
///
/// Rejects everything when no secret is configured. The comparison goes
/// through `blake3::Hash` equality, which is constant time.
pub(crate) fn check_secret(config: &Config, supplied: Option<&str>) -> Result<()> {
    match (config.secret(), supplied) {
        (Some(expected), Some(given))
            if blake3::hash(expected.as_bytes()) == blake3::hash(given.as_bytes()) =>
        {
            Ok(())
        }
        _ => Err(Error::Unauthorized),
    }
}

fn parse_json<T: for<'de> Deserialize<'de>>(body: &[u8], message: &str) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| {
        debug!(error = %e, "rejected request body");
        ApiError::bad_request(message)
    })
}

/// `GET /api/data`
pub async fn list_entries(State(state): State<AppState>) -> Json<Value> {
    let entries = state.store.read_all().await;
    Json(json!({ "ok": true, "entries": entries }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct AddRequest {
    secret: Option<String>,
    egg_id: Option<String>,
    name: Option<String>,
    cage: Option<String>,
    link: Option<String>,
}

/// `POST /api/add`
pub async fn add_entry(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    let request: AddRequest = parse_json(&body, "Invalid request data")?;
    check_secret(&state.config, request.secret.as_deref())?;

    let entry = ingest::manual_entry(
        &state.config,
        request.egg_id.as_deref().unwrap_or_default(),
        request.name.as_deref().unwrap_or_default(),
        request.cage.as_deref().unwrap_or_default(),
        request.link.as_deref(),
    )?;

    let outcome = state
        .store
        .append(entry.clone())
        .await
        .map_err(|e| ApiError::from_error(e, "Failed to add entry"))?;
    if outcome == AppendOutcome::Duplicate {
        info!(egg_id = %entry.egg_id, "add ignored duplicate");
    }
    Ok(Json(json!({ "ok": true, "entry": entry })))
}

/// Build a redirect to the app root carrying one query parameter.
fn redirect_home(config: &Config, key: &str, value: &str) -> Response {
    let base = config.base_url();
    let location = Url::parse_with_params(&format!("{base}/"), [(key, value)])
        .map_or_else(|_| format!("{base}/?{key}={value}"), String::from);
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// `GET /api/add`, the link-friendly form that answers with redirects.
pub async fn add_entry_redirect(
    State(state): State<AppState>,
    Query(query): Query<AddRequest>,
) -> Response {
    let config = &state.config;
    let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
    if !(present(&query.secret) && present(&query.egg_id) && present(&query.name) && present(&query.cage)) {
        return redirect_home(config, "error", "missing_params");
    }
    if check_secret(config, query.secret.as_deref()).is_err() {
        return redirect_home(config, "error", "unauthorized");
    }

    let entry = match ingest::manual_entry(
        config,
        query.egg_id.as_deref().unwrap_or_default(),
        query.name.as_deref().unwrap_or_default(),
        query.cage.as_deref().unwrap_or_default(),
        query.link.as_deref(),
    ) {
        Ok(entry) => entry,
        Err(e) => {
            debug!(error = %e, "add via link rejected");
            return redirect_home(config, "error", "invalid_params");
        }
    };

    match state.store.append(entry.clone()).await {
        Ok(_) => redirect_home(config, "added", &entry.egg_id),
        Err(e) => {
            warn!(error = %e, "add via link failed");
            redirect_home(config, "error", "server_error")
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DeleteRequest {
    secret: Option<String>,
    entry_id: Option<String>,
}

/// `POST /api/delete`
pub async fn delete_entry(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    const MISSING: &str = "Missing secret or entryId";

    let request: DeleteRequest = parse_json(&body, MISSING)?;
    let secret = request.secret.filter(|s| !s.is_empty());
    let entry_id = request.entry_id.filter(|id| !id.trim().is_empty());
    let (Some(secret), Some(entry_id)) = (secret, entry_id) else {
        return Err(ApiError::bad_request(MISSING));
    };
    check_secret(&state.config, Some(&secret))?;

    state
        .store
        .delete(&entry_id)
        .await
        .map_err(|e| ApiError::from_error(e, "Failed to delete entry"))?;
    Ok(Json(json!({ "ok": true, "message": "Entry deleted successfully" })))
}

/// `GET /api/egg-number`
pub async fn get_egg_number(State(state): State<AppState>) -> Json<Value> {
    let current = state.store.current_egg_number().await;
    Json(json!({ "success": true, "currentEggNumber": current }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EggNumberRequest {
    secret: Option<String>,
    number: Option<Value>,
}

/// `POST /api/egg-number`
pub async fn set_egg_number(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    const INVALID: &str = "Invalid number. Must be a positive integer.";

    let request: EggNumberRequest = parse_json(&body, INVALID)?;
    check_secret(&state.config, request.secret.as_deref())?;

    let number = request
        .number
        .as_ref()
        .and_then(Value::as_u64)
        .filter(|n| *n >= 1)
        .ok_or_else(|| ApiError::bad_request(INVALID))?;

    let current = state
        .store
        .set_egg_number(number)
        .await
        .map_err(|e| ApiError::from_error(e, "Failed to set current egg number"))?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Current egg number set to {number}"),
        "currentEggNumber": current,
    })))
}

#[derive(Debug, Deserialize)]
pub(crate) struct QrQuery {
    link: Option<String>,
}

fn artifact_response(
    content_type: &'static str,
    body: Vec<u8>,
    extra: &[(header::HeaderName, String)],
) -> ApiResult<Response> {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, ARTIFACT_CACHE);
    for (name, value) in extra {
        builder = builder.header(name, value);
    }
    builder.body(Body::from(body)).map_err(|e| ApiError::Internal {
        public: "Failed to build response",
        detail: e.to_string(),
    })
}

/// `GET /api/qr?link=`
pub async fn qr_code(
    State(state): State<AppState>,
    Query(query): Query<QrQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let link = query
        .link
        .filter(|l| !l.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing link parameter"))?;

    let png = render::png(&link, state.config.qr.size, state.config.qr.margin)
        .map_err(|e| ApiError::from_error(e, "Failed to generate QR code"))?;
    let etag = render::etag(&png);

    let matches = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == etag);
    if matches {
        let mut response = StatusCode::NOT_MODIFIED.into_response();
        if let Ok(value) = HeaderValue::from_str(&etag) {
            response.headers_mut().insert(header::ETAG, value);
        }
        return Ok(response);
    }

    artifact_response("image/png", png, &[(header::ETAG, etag)])
}

#[derive(Debug, Deserialize)]
pub(crate) struct PdfQuery {
    id: Option<String>,
}

/// `GET /api/pdf?id=`
pub async fn label_pdf(
    State(state): State<AppState>,
    Query(query): Query<PdfQuery>,
) -> ApiResult<Response> {
    let id = query
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing id parameter"))?;
    let entry = state.store.get(&id).await?;

    match render::label_pdf(&entry, state.config.qr.margin) {
        Ok(pdf) => {
            let disposition = format!("inline; filename=\"{}.pdf\"", entry.egg_id);
            artifact_response(
                "application/pdf",
                pdf,
                &[(header::CONTENT_DISPOSITION, disposition)],
            )
        }
        Err(e) => {
            warn!(error = %e, egg_id = %entry.egg_id, "PDF failed, serving HTML label");
            artifact_response(
                "text/html; charset=utf-8",
                render::label_html(&entry).into_bytes(),
                &[],
            )
        }
    }
}

/// `GET /api/sheet`
pub async fn label_sheet(State(state): State<AppState>) -> ApiResult<Response> {
    let entries = state.store.read_all().await;
    let sheet = &state.config.sheet;
    let layout = SheetLayout::new(&entries, sheet.columns, sheet.rows)?;

    let pdf = render::sheet_pdf(&layout, state.config.qr.margin)
        .map_err(|e| ApiError::from_error(e, "Failed to generate sheet"))?;
    artifact_response(
        "application/pdf",
        pdf,
        &[(
            header::CONTENT_DISPOSITION,
            "inline; filename=\"labels.pdf\"".to_string(),
        )],
    )
}

/// `POST /api/webhook`
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    if !headers.contains_key(SIGNATURE_HEADER) {
        // Not verified either way
        warn!("webhook without {SIGNATURE_HEADER} header");
    }

    let payload: Value = parse_json(&body, "Invalid webhook data")?;
    let fields = ingest::parse_payload(&payload).map_err(|e| {
        info!(error = %e, "webhook payload rejected");
        ApiError::bad_request("Invalid webhook data")
    })?;

    let (entry, _) = ingest::ingest(&state.store, &state.config, fields)
        .await
        .map_err(|e| ApiError::from_error(e, "Failed to process webhook"))?;
    Ok(Json(json!({
        "success": true,
        "message": "Entry created from webhook",
        "entry": entry,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_secret(secret: Option<&str>) -> Config {
        let mut config = Config::default();
        config.server.secret = secret.map(str::to_string);
        config
    }

    #[test]
    fn test_check_secret() {
        let config = config_with_secret(Some("hunter2"));
        assert!(check_secret(&config, Some("hunter2")).is_ok());
        assert!(check_secret(&config, Some("hunter3")).is_err());
        assert!(check_secret(&config, Some("")).is_err());
        assert!(check_secret(&config, None).is_err());

        let err = ApiError::from(check_secret(&config, Some("hunter3")).unwrap_err());
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_check_secret_without_configured_secret() {
        let config = config_with_secret(None);
        assert!(check_secret(&config, Some("")).is_err());
        assert!(check_secret(&config, Some("anything")).is_err());

        let empty = config_with_secret(Some(""));
        assert!(check_secret(&empty, Some("")).is_err());
    }

    #[test]
    fn test_redirect_home_encodes_value() {
        let mut config = Config::default();
        config.server.base_url = Some("labels.example.com".to_string());

        let response = redirect_home(&config, "added", "Egg 1");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[header::LOCATION],
            "https://labels.example.com/?added=Egg+1"
        );
    }

    #[test]
    fn test_parse_json_rejects_garbage() {
        let err = parse_json::<AddRequest>(b"{oops", "Invalid request data").unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
