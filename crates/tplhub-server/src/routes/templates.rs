//! Template management routes

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tplhub::AssetRecord;
use tracing::{debug, info};

use crate::{
    AppState,
    auth::Permission,
    error::{ApiError, Result},
};

/// Create template routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/list", get(list_templates))
        .route("/upload/{type}", post(upload_template))
        .route(
            "/{type}/{name}",
            get(download_template).delete(delete_template),
        )
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(rename = "type")]
    category: Option<String>,
}

/// List templates, newest first
async fn list_templates(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<AssetRecord>>> {
    state.keys.authorize(&headers, Permission::Read)?;
    debug!("Listing templates with query: {:?}", query);

    let category = query.category.as_deref().filter(|c| !c.is_empty());
    let records = state.store.list(category).await?;
    Ok(Json(records))
}

/// Stream a stored template back to the client
async fn download_template(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((category, file_name)): Path<(String, String)>,
) -> Result<Response> {
    state.keys.authorize(&headers, Permission::Read)?;

    let path = state.store.fetch_blob_path(&category, &file_name).await?;
    let content = tokio::fs::read(&path).await?;

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file_name))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/zip")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        content,
    )
        .into_response())
}

/// Upload a new template from a multipart form (`displayName`, `file`)
async fn upload_template(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(category): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Value>> {
    state.keys.authorize(&headers, Permission::Write)?;

    let mut display_name = String::new();
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("displayName") => {
                display_name = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            }
            Some("file") => {
                let original = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                file = Some((original, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let (original, payload) = file.ok_or_else(|| ApiError::bad_request("File is required"))?;
    info!(
        "Uploading {} template '{}' ({} bytes)",
        category,
        display_name,
        payload.len()
    );

    let outcome = state
        .store
        .add(&category, &display_name, &original, payload)
        .await?;
    let record = outcome.record;

    Ok(Json(json!({
        "message": "Template uploaded successfully",
        "displayName": record.display_name,
        "fileName": record.file_name,
        "type": record.category,
    })))
}

/// Delete a template (admin only)
async fn delete_template(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((category, file_name)): Path<(String, String)>,
) -> Result<Json<Value>> {
    state.keys.authorize(&headers, Permission::Admin)?;

    let outcome = state.store.remove(&category, &file_name).await?;

    Ok(Json(json!({
        "message": "Template deleted successfully",
        "fileName": outcome.record.file_name,
        "type": outcome.record.category,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::ApiKeys, auth::default_keys, create_router};
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use std::sync::Arc;
    use tempfile::{TempDir, tempdir};
    use tower::ServiceExt;
    use tplhub::{FileBlobStorage, NoVersionControl, StoreConfig, TemplateStore};

    const BOUNDARY: &str = "tplhub-test-boundary";

    async fn test_app() -> (TempDir, Router) {
        let temp_dir = tempdir().unwrap();
        let store = TemplateStore::open(
            StoreConfig::new(temp_dir.path()),
            Arc::new(FileBlobStorage::new(temp_dir.path())),
            Arc::new(NoVersionControl),
        )
        .await
        .unwrap();

        let state = AppState {
            store: Arc::new(store),
            keys: Arc::new(ApiKeys::new(&default_keys())),
        };
        (temp_dir, create_router(state))
    }

    fn upload_request(
        category: &str,
        key: &str,
        display_name: &str,
        file_name: &str,
    ) -> Request<Body> {
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"displayName\"\r\n\r\n{display_name}\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/zip\r\n\r\nPK-payload\r\n--{b}--\r\n",
            b = BOUNDARY,
        );
        Request::builder()
            .method(Method::POST)
            .uri(format!("/api/templates/upload/{}", category))
            .header("X-API-Key", key)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn request(method: Method, uri: &str, key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = key {
            builder = builder.header("X-API-Key", key);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_upload_list_download_delete() {
        let (_temp_dir, app) = test_app().await;

        let response = app
            .clone()
            .oneshot(upload_request("file", "writer-key", "Invoice", "a.zip"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let uploaded = json_body(response).await;
        let file_name = uploaded["fileName"].as_str().unwrap().to_string();
        assert_eq!(uploaded["displayName"], "Invoice");
        assert_eq!(uploaded["type"], "file");

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/api/templates/list?type=file", Some("reader-key")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let listed = json_body(response).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["fileName"], file_name.as_str());

        let response = app
            .clone()
            .oneshot(request(
                Method::GET,
                &format!("/api/templates/file/{}", file_name),
                Some("reader-key"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"PK-payload");

        let response = app
            .clone()
            .oneshot(request(
                Method::DELETE,
                &format!("/api/templates/file/{}", file_name),
                Some("writer-key"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .clone()
            .oneshot(request(
                Method::DELETE,
                &format!("/api/templates/file/{}", file_name),
                Some("admin-key"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(request(Method::GET, "/api/templates/list", Some("reader-key")))
            .await
            .unwrap();
        assert!(json_body(response).await.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let (_temp_dir, app) = test_app().await;

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/api/templates/list", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .clone()
            .oneshot(upload_request("file", "reader-key", "Invoice", "a.zip"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .clone()
            .oneshot(upload_request("file", "writer-key", "Invoice", "a.rar"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let response = app
            .clone()
            .oneshot(upload_request("docs", "writer-key", "Invoice", "a.zip"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        app.clone()
            .oneshot(upload_request("file", "writer-key", "Invoice", "a.zip"))
            .await
            .unwrap();
        let response = app
            .clone()
            .oneshot(upload_request("file", "writer-key", "Invoice", "a.zip"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(response).await["status"], 409);

        let response = app
            .oneshot(request(
                Method::GET,
                "/api/templates/file/Missing_00000000.zip",
                Some("reader-key"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
