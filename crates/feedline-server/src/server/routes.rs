use super::error::ApiError;
use axum::{
    Json, Router,
    extract::{
        FromRequestParts, Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, request::Parts},
    routing::{get, post},
};
use feedline::{
    ContentId, ContentItem, Dispatcher, FeedPage, FeedParams, FeedQuery, FeedReader, FeedWriter,
    MemoryStore, PageRequest, UserId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Header carrying the authenticated user id. Authentication itself happens
/// upstream; the server trusts whatever the gateway forwards.
pub const USER_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    store: Arc<MemoryStore>,
    reader: FeedReader<MemoryStore>,
    writer: FeedWriter<MemoryStore>,
}

impl AppState {
    pub fn new(store: Arc<MemoryStore>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            reader: FeedReader::new(Arc::clone(&store)),
            writer: FeedWriter::new(Arc::clone(&store), dispatcher),
            store,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/feed", get(feed))
        .route("/users/{id}/posts", get(user_posts))
        .route("/users/{id}/follow", post(follow))
        .route("/posts", post(create_post))
        .route("/posts/{id}/likes", post(like))
        .route("/posts/{id}/comments", post(comment))
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        )
        .with_state(state)
}

/// The caller's identity, if any.
#[derive(Clone, Copy, Debug)]
pub struct Viewer(pub Option<UserId>);

impl Viewer {
    fn require(self) -> Result<UserId, ApiError> {
        self.0.ok_or(ApiError::Unauthenticated)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Viewer {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(raw) = parts.headers.get(USER_HEADER) else {
            return Ok(Self(None));
        };
        let id = raw
            .to_str()
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .ok_or_else(|| ApiError::invalid(format!("{USER_HEADER} must be an unsigned integer")))?;
        Ok(Self(Some(UserId(id))))
    }
}

#[derive(Debug, Deserialize)]
pub struct BodyInput {
    pub body: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Created {
    pub created: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentCreated {
    pub content_id: ContentId,
    pub comment_count: u64,
}

async fn healthz() -> &'static str {
    "ok"
}

/// A signed-in viewer pages their fanned-out home feed; anonymous callers
/// page everything.
async fn feed(
    State(state): State<AppState>,
    viewer: Viewer,
    params: Result<Query<FeedParams>, QueryRejection>,
) -> Result<Json<FeedPage>, ApiError> {
    let Query(params) = params?;
    let query = viewer.0.map_or(FeedQuery::Global, FeedQuery::Timeline);
    serve(&state, &query, params, viewer).await
}

async fn user_posts(
    State(state): State<AppState>,
    viewer: Viewer,
    owner: Result<Path<u64>, PathRejection>,
    params: Result<Query<FeedParams>, QueryRejection>,
) -> Result<Json<FeedPage>, ApiError> {
    let Path(owner) = owner?;
    let Query(params) = params?;
    serve(&state, &FeedQuery::ByOwner(UserId(owner)), params, viewer).await
}

async fn serve(
    state: &AppState,
    query: &FeedQuery,
    params: FeedParams,
    viewer: Viewer,
) -> Result<Json<FeedPage>, ApiError> {
    let request = PageRequest::try_from(params)?;
    let page = state.reader.read(query, request, viewer.0).await?;
    Ok(Json(page))
}

async fn create_post(
    State(state): State<AppState>,
    viewer: Viewer,
    input: Result<Json<BodyInput>, JsonRejection>,
) -> Result<(StatusCode, Json<ContentItem>), ApiError> {
    let author = viewer.require()?;
    let Json(input) = input?;
    let item = state.writer.publish(author, input.body).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn follow(
    State(state): State<AppState>,
    viewer: Viewer,
    author: Result<Path<u64>, PathRejection>,
) -> Result<(StatusCode, Json<Created>), ApiError> {
    let follower = viewer.require()?;
    let Path(author) = author?;
    let created = state.store.follow(follower, UserId(author))?;
    Ok(created_status(created))
}

async fn like(
    State(state): State<AppState>,
    viewer: Viewer,
    content: Result<Path<u64>, PathRejection>,
) -> Result<(StatusCode, Json<Created>), ApiError> {
    let user = viewer.require()?;
    let Path(content) = content?;
    let created = state.store.like(user, ContentId(content))?;
    Ok(created_status(created))
}

async fn comment(
    State(state): State<AppState>,
    viewer: Viewer,
    content: Result<Path<u64>, PathRejection>,
    input: Result<Json<BodyInput>, JsonRejection>,
) -> Result<(StatusCode, Json<CommentCreated>), ApiError> {
    let user = viewer.require()?;
    let Path(content) = content?;
    let Json(input) = input?;
    if input.body.trim().is_empty() {
        return Err(ApiError::invalid("body must not be empty"));
    }
    let content_id = ContentId(content);
    let comment_count = state.store.comment(user, content_id, input.body)?;
    Ok((
        StatusCode::CREATED,
        Json(CommentCreated {
            content_id,
            comment_count,
        }),
    ))
}

// Repeating an idempotent write answers 200 instead of 201
fn created_status(created: bool) -> (StatusCode, Json<Created>) {
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    (status, Json(Created { created }))
}
