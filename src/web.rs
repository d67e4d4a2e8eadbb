use crate::{
    app::{App, AppError, FolderSummary, RelatedNotes, RelatedOptions},
    auth,
    folders::{FolderCreate, FolderUpdate},
    notes::{parse_tags, Note, NoteCreate, NoteQuery, NoteUpdate},
};
use axum::{
    extract::{Path, Query, Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;

#[derive(Clone)]
struct SharedState {
    app: App,
}

/// User the authenticated request acts as.
#[derive(Clone, Debug)]
struct CurrentUser(String);

pub fn router(app: App) -> Router {
    let shared_state = Arc::new(SharedState { app });

    Router::new()
        .route("/api/notes", get(list).post(create))
        .route("/api/notes/:id", get(show).put(update).delete(delete))
        .route("/api/notes/:id/embedding", post(reembed))
        .route("/api/notes/:id/related", get(related))
        .route("/api/tags", get(tags))
        .route("/api/folders", get(list_folders).post(create_folder))
        .route(
            "/api/folders/:id",
            get(show_folder).put(update_folder).delete(delete_folder),
        )
        .route("/api/ai/summarize", post(summarize))
        .route("/api/ai/expand", post(expand))
        .route("/api/ai/title", post(title))
        .layer(
            ServiceBuilder::new()
                .layer(
                    tower_http::trace::TraceLayer::new_for_http()
                        .make_span_with(
                            tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                        )
                        .on_response(
                            tower_http::trace::DefaultOnResponse::new()
                                .level(tracing::Level::INFO),
                        ),
                )
                .layer(middleware::from_fn_with_state(
                    shared_state.clone(),
                    require_user,
                )),
        )
        .with_state(shared_state)
}

pub async fn serve(app: App, addr: &str) -> anyhow::Result<()> {
    let router = router(app);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("listening on {addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                log::error!("failed to install signal handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::warn!("shutting down");
}

async fn require_user(
    State(state): State<Arc<SharedState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let config = state.app.config();
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    match auth::resolve_user(header, &config.api_tokens, &config.default_user) {
        Ok(user) => {
            request.extensions_mut().insert(CurrentUser(user));
            next.run(request).await
        }
        Err(err) => {
            log::debug!("rejected request to {}: {err}", request.uri().path());
            (StatusCode::UNAUTHORIZED, Json(json!({"error": err.to_string()}))).into_response()
        }
    }
}

#[derive(Debug)]
struct HttpError(AppError);

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            AppError::NotFound | AppError::FolderNotFound => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::NoEmbedding => StatusCode::BAD_REQUEST,
            AppError::Similarity(_) | AppError::Ai(_) | AppError::IO(_) | AppError::Other(_) => {
                log::error!("{self:?}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListNotesRequest {
    pub search: Option<String>,
    /// Comma separated
    pub tags: Option<String>,
    pub folder_id: Option<String>,
}

async fn list(
    State(state): State<Arc<SharedState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(payload): Query<ListNotesRequest>,
) -> Result<Json<Vec<Note>>, HttpError> {
    log::debug!("payload: {payload:?}");

    let query = NoteQuery {
        search: payload.search,
        tags: payload.tags.as_deref().map(parse_tags),
        folder_id: payload.folder_id,
    };

    Ok(Json(state.app.list_notes(&user, query)?))
}

async fn create(
    State(state): State<Arc<SharedState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<NoteCreate>,
) -> Result<(StatusCode, Json<Note>), HttpError> {
    log::debug!("payload: {payload:?}");

    let note = state.app.create_note(&user, payload).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

async fn show(
    State(state): State<Arc<SharedState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<u64>,
) -> Result<Json<Note>, HttpError> {
    Ok(Json(state.app.get_note(&user, id)?))
}

async fn update(
    State(state): State<Arc<SharedState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<u64>,
    Json(payload): Json<NoteUpdate>,
) -> Result<Json<Note>, HttpError> {
    log::debug!("payload: {payload:?}");

    Ok(Json(state.app.update_note(&user, id, payload).await?))
}

async fn delete(
    State(state): State<Arc<SharedState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<u64>,
) -> Result<StatusCode, HttpError> {
    state.app.delete_note(&user, id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReembedResponse {
    pub has_embedding: bool,
    pub note: Note,
}

async fn reembed(
    State(state): State<Arc<SharedState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<u64>,
) -> Result<Json<ReembedResponse>, HttpError> {
    let note = state.app.reembed_note(&user, id).await?;

    Ok(Json(ReembedResponse {
        has_embedding: note.has_embedding(),
        note,
    }))
}

async fn related(
    State(state): State<Arc<SharedState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<u64>,
    Query(opts): Query<RelatedOptions>,
) -> Result<Json<RelatedNotes>, HttpError> {
    log::debug!("related notes for {id}: {opts:?}");

    Ok(Json(state.app.related_notes(&user, id, opts)?))
}

async fn tags(
    State(state): State<Arc<SharedState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Vec<String>>, HttpError> {
    Ok(Json(state.app.tags(&user)?))
}

async fn list_folders(
    State(state): State<Arc<SharedState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Vec<FolderSummary>>, HttpError> {
    Ok(Json(state.app.list_folders(&user)?))
}

async fn create_folder(
    State(state): State<Arc<SharedState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<FolderCreate>,
) -> Result<(StatusCode, Json<FolderSummary>), HttpError> {
    log::debug!("payload: {payload:?}");

    let folder = state.app.create_folder(&user, payload)?;
    Ok((StatusCode::CREATED, Json(folder)))
}

async fn show_folder(
    State(state): State<Arc<SharedState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<FolderSummary>, HttpError> {
    Ok(Json(state.app.get_folder(&user, &id)?))
}

async fn update_folder(
    State(state): State<Arc<SharedState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(payload): Json<FolderUpdate>,
) -> Result<Json<FolderSummary>, HttpError> {
    log::debug!("payload: {payload:?}");

    Ok(Json(state.app.update_folder(&user, &id, payload)?))
}

async fn delete_folder(
    State(state): State<Arc<SharedState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, HttpError> {
    state.app.delete_folder(&user, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ContentRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ExpandRequest {
    pub shorthand: String,
}

async fn summarize(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<ContentRequest>,
) -> Result<Json<serde_json::Value>, HttpError> {
    let summary = state.app.summarize(&payload.content).await?;
    Ok(Json(json!({ "summary": summary })))
}

async fn expand(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<ExpandRequest>,
) -> Result<Json<serde_json::Value>, HttpError> {
    let expanded = state.app.expand(&payload.shorthand).await?;
    Ok(Json(json!({ "expanded_content": expanded })))
}

async fn title(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<ContentRequest>,
) -> Result<Json<serde_json::Value>, HttpError> {
    let title = state.app.generate_title(&payload.content).await?;
    Ok(Json(json!({ "title": title })))
}
