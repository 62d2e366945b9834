use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, Method, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use ebooks::media::validate_audio_filename;
use ebooks::services::{Ebook, EbookFilters, ServiceError, Upload};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::auth::{auth_middleware, require_write, ApiKeyAuth};
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: u64 = 10;
const MAX_PAGE_SIZE: u64 = 100;
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Deserialize)]
pub struct ListQuery {
    page: Option<u64>,
    page_size: Option<u64>,
    #[serde(rename = "type")]
    type_id: Option<i64>,
    search: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateTypeBody {
    slug: String,
    title: String,
}

#[derive(Deserialize)]
pub struct UpdateTypeBody {
    slug: Option<String>,
    title: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateProfileBody {
    name: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateMoneyBody {
    money: f64,
}

/// Client representation of an ebook: artifact references resolve to URLs
/// and `duration` is read-only.
#[derive(Serialize)]
pub struct EbookRepr {
    id: i64,
    title: String,
    description: String,
    image: String,
    audio: Option<String>,
    duration: Option<f64>,
    #[serde(rename = "type")]
    type_id: Option<i64>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    code: String,
    message: String,
}

fn error_response(status: StatusCode, code: &str, message: &str) -> axum::response::Response {
    let body = ErrorResponse {
        error: ErrorDetail {
            code: code.to_string(),
            message: message.to_string(),
        },
    };
    (status, Json(body)).into_response()
}

fn service_error_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Validation(msg) => error_response(StatusCode::BAD_REQUEST, "bad_request", &msg),
        ServiceError::NotFound(msg) => error_response(StatusCode::NOT_FOUND, "not_found", &msg),
        ServiceError::Integrity(msg) => error_response(StatusCode::CONFLICT, "conflict", &msg),
        ServiceError::Internal(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            &e.to_string(),
        ),
    }
}

fn artifact_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

fn ebook_repr(base_url: &str, ebook: Ebook) -> EbookRepr {
    EbookRepr {
        id: ebook.id,
        title: ebook.title,
        description: ebook.description,
        image: artifact_url(base_url, &ebook.image),
        audio: ebook.audio.as_deref().map(|a| artifact_url(base_url, a)),
        duration: ebook.duration,
        type_id: ebook.type_id,
    }
}

/// Translate 1-based page parameters to limit/offset, clamping the page
/// size to the configured maximum.
fn page_params(page: Option<u64>, page_size: Option<u64>) -> (usize, usize) {
    let page = page.unwrap_or(1).max(1);
    let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = (page - 1).saturating_mul(page_size);
    (page_size as usize, offset as usize)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

// -- Ebook form intake --

/// Fields accepted from a multipart ebook payload. `duration` is ignored if
/// supplied: it is derived, never client-set. An empty `type` value detaches
/// the type on update.
#[derive(Default)]
struct EbookForm {
    title: Option<String>,
    description: Option<String>,
    type_id: Option<Option<i64>>,
    image: Option<Upload>,
    audio: Option<Upload>,
}

async fn read_ebook_form(mut multipart: Multipart) -> Result<EbookForm, String> {
    let mut form = EbookForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| format!("Invalid multipart payload: {}", e))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "title" => {
                form.title = Some(field.text().await.map_err(|e| e.to_string())?);
            }
            "description" => {
                form.description = Some(field.text().await.map_err(|e| e.to_string())?);
            }
            "type" => {
                let text = field.text().await.map_err(|e| e.to_string())?;
                form.type_id = if text.is_empty() {
                    Some(None)
                } else {
                    Some(Some(
                        text.parse::<i64>()
                            .map_err(|_| format!("Invalid type id '{}'", text))?,
                    ))
                };
            }
            "image" | "audio" => {
                let filename = field
                    .file_name()
                    .unwrap_or("upload")
                    .to_string();
                let bytes = field.bytes().await.map_err(|e| e.to_string())?.to_vec();
                let upload = Upload { filename, bytes };
                if name == "image" {
                    form.image = Some(upload);
                } else {
                    form.audio = Some(upload);
                }
            }
            // duration is read-only; unknown fields are ignored
            _ => {}
        }
    }

    // Request-boundary extension check; the service validates again.
    if let Some(audio) = &form.audio {
        validate_audio_filename(&audio.filename).map_err(|e| e.to_string())?;
    }

    Ok(form)
}

// -- Ebook handlers --

async fn list_ebooks(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> axum::response::Response {
    let (limit, offset) = page_params(query.page, query.page_size);
    let filters = EbookFilters {
        type_id: query.type_id,
        search: query.search,
        limit: Some(limit),
        offset,
    };

    let count = match state.ebook_service.count(&filters).await {
        Ok(count) => count,
        Err(e) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                &e.to_string(),
            )
        }
    };

    match state.ebook_service.list(&filters).await {
        Ok(ebooks) => {
            let base = &state.config.media.base_url;
            let results: Vec<_> = ebooks.into_iter().map(|e| ebook_repr(base, e)).collect();
            Json(serde_json::json!({"count": count, "results": results})).into_response()
        }
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            &e.to_string(),
        ),
    }
}

async fn create_ebook(
    State(state): State<AppState>,
    multipart: Multipart,
) -> axum::response::Response {
    let form = match read_ebook_form(multipart).await {
        Ok(form) => form,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, "bad_request", &msg),
    };
    let Some(title) = form.title else {
        return error_response(StatusCode::BAD_REQUEST, "bad_request", "Title is required");
    };

    match state
        .ebook_service
        .create(
            title,
            form.description.unwrap_or_default(),
            form.type_id.flatten(),
            form.image,
            form.audio,
        )
        .await
    {
        Ok(ebook) => {
            let repr = ebook_repr(&state.config.media.base_url, ebook);
            (StatusCode::CREATED, Json(repr)).into_response()
        }
        Err(e) => service_error_response(e),
    }
}

async fn get_ebook(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> axum::response::Response {
    match state.ebook_service.get(id).await {
        Ok(Some(ebook)) => Json(ebook_repr(&state.config.media.base_url, ebook)).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            "not_found",
            &format!("Ebook '{}' not found", id),
        ),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            &e.to_string(),
        ),
    }
}

async fn update_ebook(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> axum::response::Response {
    let form = match read_ebook_form(multipart).await {
        Ok(form) => form,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, "bad_request", &msg),
    };

    match state
        .ebook_service
        .update(
            id,
            form.title,
            form.description,
            form.type_id,
            form.image,
            form.audio,
        )
        .await
    {
        Ok(ebook) => Json(ebook_repr(&state.config.media.base_url, ebook)).into_response(),
        Err(e) => service_error_response(e),
    }
}

async fn delete_ebook(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> axum::response::Response {
    match state.ebook_service.remove(id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            "not_found",
            &format!("Ebook '{}' not found", id),
        ),
        Err(e) => service_error_response(e),
    }
}

// -- Type handlers --

async fn list_types(State(state): State<AppState>) -> axum::response::Response {
    match state.type_service.list().await {
        Ok(types) => Json(serde_json::json!({"results": types})).into_response(),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            &e.to_string(),
        ),
    }
}

async fn create_type(
    State(state): State<AppState>,
    Json(body): Json<CreateTypeBody>,
) -> axum::response::Response {
    match state.type_service.add(&body.slug, body.title).await {
        Ok(ebook_type) => (StatusCode::CREATED, Json(ebook_type)).into_response(),
        Err(e) => service_error_response(e),
    }
}

async fn get_type(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> axum::response::Response {
    match state.type_service.get(id).await {
        Ok(Some(ebook_type)) => Json(ebook_type).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            "not_found",
            &format!("Type '{}' not found", id),
        ),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            &e.to_string(),
        ),
    }
}

async fn update_type(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateTypeBody>,
) -> axum::response::Response {
    match state.type_service.update(id, body.slug, body.title).await {
        Ok(ebook_type) => Json(ebook_type).into_response(),
        Err(e) => service_error_response(e),
    }
}

async fn delete_type(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> axum::response::Response {
    match state.type_service.remove(id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            "not_found",
            &format!("Type '{}' not found", id),
        ),
        Err(e) => service_error_response(e),
    }
}

// -- Profile handlers --

async fn create_profile(
    State(state): State<AppState>,
    Json(body): Json<CreateProfileBody>,
) -> axum::response::Response {
    match state
        .profile_service
        .create(body.name.unwrap_or_default())
        .await
    {
        Ok(profile) => (StatusCode::CREATED, Json(profile)).into_response(),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            &e.to_string(),
        ),
    }
}

async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> axum::response::Response {
    match state.profile_service.get(id).await {
        Ok(Some(profile)) => Json(profile).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            "not_found",
            &format!("Profile '{}' not found", id),
        ),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            &e.to_string(),
        ),
    }
}

async fn update_profile_money(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateMoneyBody>,
) -> axum::response::Response {
    match state.profile_service.update_money(id, body.money).await {
        Ok(profile) => Json(profile).into_response(),
        Err(e) => service_error_response(e),
    }
}

async fn profile_admin_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> axum::response::Response {
    match state.profile_service.admin_status(id).await {
        Ok(is_admin) => Json(serde_json::json!({"is_admin": is_admin})).into_response(),
        Err(e) => service_error_response(e),
    }
}

pub fn build_router(state: AppState) -> Router {
    let api_key_auth = ApiKeyAuth::from_env();

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    // Routes that require write access
    let write_routes = Router::new()
        .route("/api/v1/ebooks", post(create_ebook))
        .route(
            "/api/v1/ebooks/{id}",
            put(update_ebook).delete(delete_ebook),
        )
        .route("/api/v1/types", post(create_type))
        .route("/api/v1/types/{id}", put(update_type).delete(delete_type))
        .route("/api/v1/profile", post(create_profile))
        .route("/api/v1/profile/{id}/money", put(update_profile_money))
        .route_layer(middleware::from_fn(require_write));

    // Read-only API routes
    let read_routes = Router::new()
        .route("/api/v1/ebooks", get(list_ebooks))
        .route("/api/v1/ebooks/{id}", get(get_ebook))
        .route("/api/v1/types", get(list_types))
        .route("/api/v1/types/{id}", get(get_type))
        .route("/api/v1/profile/{id}", get(get_profile))
        .route("/api/v1/profile/{id}/adminstatus", get(profile_admin_status));

    let api_routes = Router::new()
        .merge(write_routes)
        .merge(read_routes)
        .route_layer(middleware::from_fn(auth_middleware))
        .layer(axum::Extension(api_key_auth));

    let media_url = state.config.media.base_url.clone();
    let media_root = state.config.media.root.clone();

    Router::new()
        .route("/health", get(health))
        .merge(api_routes)
        .nest_service(&media_url, ServeDir::new(media_root))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use axum::body::Body;
    use axum::http::Request;
    use ebooks::services::{EbookService, ProfileService, ProjectConfig, TypeService};
    use ebooks::testing::{FixedDuration, MemoryArtifactStore, TestDatabase};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let db = Arc::new(TestDatabase::new());
        let store = Arc::new(MemoryArtifactStore::new());
        let ebook_service = Arc::new(EbookService::new(
            db.clone(),
            store,
            Arc::new(FixedDuration(3.5)),
        ));
        let type_service = Arc::new(TypeService::new(db.clone()));
        let profile_service = Arc::new(ProfileService::new(db));
        AppState {
            ebook_service,
            type_service,
            profile_service,
            config: ProjectConfig::default(),
        }
    }

    fn multipart_body(boundary: &str, parts: &[(&str, Option<&str>, &str)]) -> String {
        let mut body = String::new();
        for (name, filename, value) in parts {
            body.push_str(&format!("--{}\r\n", boundary));
            match filename {
                Some(filename) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\r\n",
                    name, filename
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                    name
                )),
            }
            body.push_str(value);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{}--\r\n", boundary));
        body
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn create_rejects_invalid_audio_extension_at_the_request_boundary() {
        let app = build_router(test_state());
        let boundary = "bounds";
        let body = multipart_body(
            boundary,
            &[
                ("title", None, "A"),
                ("audio", Some("file.txt"), "not audio"),
            ],
        );

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/ebooks")
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={}", boundary),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert!(json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("Unsupported file type"));

        // Nothing reached the store
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/ebooks")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["count"], 0);
    }

    #[test]
    fn page_params_defaults() {
        assert_eq!(page_params(None, None), (10, 0));
    }

    #[test]
    fn page_params_saturates_on_huge_page() {
        assert_eq!(
            page_params(Some(u64::MAX), Some(100)),
            (100, u64::MAX as usize)
        );
    }

    #[test]
    fn page_params_translates_pages_to_offsets() {
        assert_eq!(page_params(Some(3), Some(25)), (25, 50));
    }

    #[test]
    fn page_params_clamps_page_size() {
        assert_eq!(page_params(None, Some(1000)), (100, 0));
        assert_eq!(page_params(None, Some(0)), (1, 0));
    }

    #[test]
    fn page_params_treats_page_zero_as_first() {
        assert_eq!(page_params(Some(0), None), (10, 0));
    }

    #[test]
    fn artifact_url_joins_base_and_path() {
        assert_eq!(artifact_url("/media", "default.png"), "/media/default.png");
        assert_eq!(
            artifact_url("/media/", "ebook_pics/x.png"),
            "/media/ebook_pics/x.png"
        );
    }
}
