//! In-process stand-in for the CLAIM'N `/api/v2` backend.
//!
//! Endpoints deliberately answer with different envelopes (`{data}`,
//! `{items, pagination}`, `{results, meta}`, bare arrays) the way the real
//! backend does. Every route requires `Authorization: Bearer <token>`;
//! the token `expired` is rejected with 401.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub const EXPIRED_TOKEN: &str = "expired";
pub const MEMBER_ID: &str = "m-1";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Deserialize)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub content: String,
    pub likes: u64,
}

#[derive(Deserialize)]
pub struct NewPost {
    pub content: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub participant_ids: Vec<String>,
    pub last_message: Option<String>,
    pub unread_count: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
}

#[derive(Deserialize)]
pub struct NewMessage {
    pub content: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub title: String,
    pub status: String,
    pub target_value: Option<f64>,
    pub current_value: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Expert {
    pub id: String,
    pub name: String,
    pub specialties: Vec<String>,
}

/// Backend state.
#[derive(Debug)]
pub struct Store {
    pub profile: Profile,
    pub posts: Vec<Post>,
    pub conversations: Vec<Conversation>,
    pub messages: Vec<Message>,
    pub goals: Vec<Goal>,
    pub expert: Option<Expert>,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            profile: Profile {
                id: MEMBER_ID.to_string(),
                first_name: "Erik".to_string(),
                last_name: "Lindqvist".to_string(),
                bio: None,
                avatar_url: None,
            },
            posts: Vec::new(),
            conversations: vec![Conversation {
                id: "c-1".to_string(),
                participant_ids: vec![MEMBER_ID.to_string(), "m-2".to_string()],
                last_message: None,
                unread_count: 0,
            }],
            messages: Vec::new(),
            goals: vec![
                Goal {
                    id: "g-1".to_string(),
                    title: "Run 5k under 25 minutes".to_string(),
                    status: "active".to_string(),
                    target_value: Some(25.0),
                    current_value: Some(27.5),
                },
                Goal {
                    id: "g-2".to_string(),
                    title: "Read 12 books".to_string(),
                    status: "completed".to_string(),
                    target_value: Some(12.0),
                    current_value: Some(12.0),
                },
            ],
            expert: None,
        }
    }
}

pub type Db = Arc<RwLock<Store>>;

/// Failure rendered as `{ "error": { "code", "message" } }`.
#[derive(Debug)]
pub struct ApiFailure {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiFailure {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn not_found(what: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", format!("{what} not found"))
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let body = json!({"error": {"code": self.code, "message": self.message}});
        (self.status, Json(body)).into_response()
    }
}

pub fn app() -> Router {
    app_with(Store::default())
}

pub fn app_with(store: Store) -> Router {
    let db: Db = Arc::new(RwLock::new(store));
    let api = Router::new()
        .route("/members/profile", get(get_profile).patch(update_profile))
        .route("/members/profile/avatar", post(upload_avatar))
        .route("/feed/posts", get(list_posts).post(create_post))
        .route("/feed/posts/{id}", delete(delete_post))
        .route("/messages/conversations", get(list_conversations))
        .route("/messages/conversations/{id}/messages", post(send_message))
        .route("/goals", get(list_goals))
        .route("/experts/my-expert", get(my_expert))
        .route("/broken", get(broken))
        .layer(middleware::from_fn(require_bearer))
        .with_state(db);
    Router::new()
        .nest("/api/v2", api)
        .layer(TraceLayer::new_for_http())
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn require_bearer(request: Request, next: Next) -> Result<Response, ApiFailure> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .map(str::to_owned);
    match token.as_deref() {
        Some(EXPIRED_TOKEN) => Err(ApiFailure::new(
            StatusCode::UNAUTHORIZED,
            "TOKEN_EXPIRED",
            "Access token has expired",
        )),
        Some(_) => Ok(next.run(request).await),
        None => Err(ApiFailure::new(
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "Missing bearer token",
        )),
    }
}

async fn get_profile(State(db): State<Db>) -> Json<serde_json::Value> {
    let store = db.read().await;
    Json(json!({"data": store.profile}))
}

async fn update_profile(State(db): State<Db>, Json(input): Json<ProfileUpdate>) -> Json<Profile> {
    let mut store = db.write().await;
    let profile = &mut store.profile;
    if let Some(first_name) = input.first_name {
        profile.first_name = first_name;
    }
    if let Some(last_name) = input.last_name {
        profile.last_name = last_name;
    }
    if let Some(bio) = input.bio {
        profile.bio = Some(bio);
    }
    Json(profile.clone())
}

async fn upload_avatar(
    State(db): State<Db>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiFailure> {
    let bad_request = |message: String| ApiFailure::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message);
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.to_string()))?
    {
        if field.name() != Some("avatar") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("avatar").to_string();
        let bytes = field.bytes().await.map_err(|e| bad_request(e.to_string()))?;
        if bytes.is_empty() {
            return Err(bad_request("empty file".to_string()));
        }
        let url = format!("https://cdn.claimn.co/avatars/{}-{file_name}", Uuid::new_v4());
        db.write().await.profile.avatar_url = Some(url.clone());
        return Ok(Json(json!({"url": url})));
    }
    Err(bad_request("missing avatar field".to_string()))
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

async fn list_posts(State(db): State<Db>, Query(query): Query<PageQuery>) -> Json<serde_json::Value> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).max(1);
    let store = db.read().await;
    let total = store.posts.len() as u64;
    let start = (page - 1).saturating_mul(limit).min(total) as usize;
    let end = page.saturating_mul(limit).min(total) as usize;
    Json(json!({
        "items": &store.posts[start..end],
        "pagination": {
            "page": page,
            "limit": limit,
            "total": total,
            "has_next": (end as u64) < total,
        }
    }))
}

async fn create_post(
    State(db): State<Db>,
    Json(input): Json<NewPost>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiFailure> {
    if input.content.trim().is_empty() {
        return Err(ApiFailure::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "VALIDATION_ERROR",
            "content must not be empty",
        ));
    }
    let post = Post {
        id: Uuid::new_v4().to_string(),
        author_id: MEMBER_ID.to_string(),
        content: input.content,
        likes: 0,
    };
    db.write().await.posts.insert(0, post.clone());
    Ok((StatusCode::CREATED, Json(json!({"data": post}))))
}

async fn delete_post(State(db): State<Db>, Path(id): Path<String>) -> Result<StatusCode, ApiFailure> {
    let mut store = db.write().await;
    let before = store.posts.len();
    store.posts.retain(|p| p.id != id);
    if store.posts.len() == before {
        return Err(ApiFailure::not_found("post"));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn list_conversations(State(db): State<Db>) -> Json<Vec<Conversation>> {
    Json(db.read().await.conversations.clone())
}

async fn send_message(
    State(db): State<Db>,
    Path(id): Path<String>,
    Json(input): Json<NewMessage>,
) -> Result<(StatusCode, Json<Message>), ApiFailure> {
    let mut store = db.write().await;
    let conversation = store
        .conversations
        .iter_mut()
        .find(|c| c.id == id)
        .ok_or_else(|| ApiFailure::not_found("conversation"))?;
    conversation.last_message = Some(input.content.clone());
    let message = Message {
        id: Uuid::new_v4().to_string(),
        conversation_id: id,
        sender_id: MEMBER_ID.to_string(),
        content: input.content,
    };
    store.messages.push(message.clone());
    Ok((StatusCode::CREATED, Json(message)))
}

#[derive(Deserialize)]
pub struct GoalsQuery {
    pub status: Option<String>,
}

async fn list_goals(State(db): State<Db>, Query(query): Query<GoalsQuery>) -> Json<serde_json::Value> {
    let store = db.read().await;
    let goals: Vec<&Goal> = store
        .goals
        .iter()
        .filter(|g| query.status.as_deref().map_or(true, |s| g.status == s))
        .collect();
    Json(json!({
        "results": goals,
        "meta": {"page": 1, "per_page": 50, "total": goals.len()}
    }))
}

async fn my_expert(State(db): State<Db>) -> Result<Json<Expert>, ApiFailure> {
    db.read()
        .await
        .expert
        .clone()
        .map(Json)
        .ok_or_else(|| ApiFailure::not_found("expert"))
}

/// Fails with a non-JSON body.
async fn broken() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
}
