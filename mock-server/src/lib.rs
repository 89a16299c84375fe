//! In-memory stand-in for the remote API.
//!
//! Serves a `users` resource under `/api/v2/` and rejects every request whose
//! `APIAuth` signature does not verify. The signature check is implemented
//! here independently of the client so the two can catch each other's drift.

use std::{collections::HashMap, sync::Arc};

use axum::{
    body::{Body, Bytes},
    extract::{Path, Request, State},
    http::{request::Parts, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const USERS_PATH: &str = "/api/v2/users";

#[derive(Clone, Debug)]
pub struct Credentials {
    pub public_key: String,
    pub secret_key: String,
}

impl Credentials {
    pub fn new(public_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// The `Authorization` value a correctly signed request must carry.
    pub fn authorization(
        &self,
        content_type: &str,
        content_md5: &str,
        path: &str,
        date: &str,
    ) -> Option<String> {
        let canonical = format!("{content_type},{content_md5},{path},{date}");
        let mut mac = Hmac::<Sha1>::new_from_slice(self.secret_key.as_bytes()).ok()?;
        mac.update(canonical.as_bytes());
        let signature = BASE64.encode(mac.finalize().into_bytes());
        Some(format!("APIAuth {}:{signature}", self.public_key))
    }
}

/// Base64 MD5 of `body`, empty for an empty body.
pub fn content_md5(body: &[u8]) -> String {
    if body.is_empty() {
        return String::new();
    }
    BASE64.encode(Md5::digest(body))
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserAttributes {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: UserAttributes,
}

/// Top-level `{"data": ...}` envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct Document<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub struct Incoming<A> {
    pub attributes: A,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
}

pub type Db = Arc<RwLock<HashMap<Uuid, User>>>;

#[derive(Clone)]
struct AppState {
    credentials: Arc<Credentials>,
    db: Db,
}

pub fn app(credentials: Credentials) -> Router {
    let state = AppState {
        credentials: Arc::new(credentials),
        db: Arc::new(RwLock::new(HashMap::new())),
    };
    Router::new()
        .route(USERS_PATH, get(list_users).post(create_user))
        .route(
            &format!("{USERS_PATH}/{{id}}"),
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), verify_signature))
        .with_state(state)
}

pub async fn run(listener: TcpListener, credentials: Credentials) -> Result<(), std::io::Error> {
    axum::serve(listener, app(credentials)).await
}

async fn verify_signature(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    if !is_signed(&state.credentials, &parts, &bytes) {
        tracing::warn!(path = %parts.uri.path(), "rejected unsigned or mis-signed request");
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

fn is_signed(credentials: &Credentials, parts: &Parts, body: &Bytes) -> bool {
    let md5 = header(parts, "content-md5");
    let date = header(parts, "date");
    if md5 != content_md5(body) || date.is_empty() {
        return false;
    }
    credentials
        .authorization(header(parts, "content-type"), md5, parts.uri.path(), date)
        .is_some_and(|expected| header(parts, "authorization") == expected)
}

fn header<'a>(parts: &'a Parts, name: &str) -> &'a str {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

async fn list_users(State(state): State<AppState>) -> Json<Document<Vec<User>>> {
    let users = state.db.read().await;
    Json(Document {
        data: users.values().cloned().collect(),
    })
}

async fn create_user(
    State(state): State<AppState>,
    Json(input): Json<Document<Incoming<UserAttributes>>>,
) -> (StatusCode, Json<Document<User>>) {
    let user = User {
        id: Uuid::new_v4(),
        kind: "users".to_string(),
        attributes: input.data.attributes,
    };
    state.db.write().await.insert(user.id, user.clone());
    (StatusCode::CREATED, Json(Document { data: user }))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Document<User>>, StatusCode> {
    let users = state.db.read().await;
    users
        .get(&id)
        .cloned()
        .map(|data| Json(Document { data }))
        .ok_or(StatusCode::NOT_FOUND)
}

async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<Document<Incoming<UpdateUser>>>,
) -> Result<Json<Document<User>>, StatusCode> {
    let mut users = state.db.write().await;
    let user = users.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    let changes = input.data.attributes;
    if let Some(name) = changes.name {
        user.attributes.name = name;
    }
    if let Some(email) = changes.email {
        user.attributes.email = Some(email);
    }
    Ok(Json(Document { data: user.clone() }))
}

async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    let mut users = state.db.write().await;
    users
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or(StatusCode::NOT_FOUND)
}
