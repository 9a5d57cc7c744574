#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set, ActiveValue::NotSet};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use storefront_api::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    entity::users::{ActiveModel as UserActive, Model as UserModel},
    middleware::auth::AuthUser,
    routes::create_app,
    services::auth_service::issue_token,
    state::AppState,
};

pub const TEST_SECRET: &str = "test_secret_key_for_storefront_tests";

pub fn test_config(database_url: &str) -> AppConfig {
    AppConfig {
        database_url: database_url.to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        jwt_secret: TEST_SECRET.to_string(),
        jwt_ttl_hours: 1,
    }
}

/// State without a database; only good for requests rejected before any query runs.
pub fn offline_state() -> AppState {
    AppState::new(DatabaseConnection::Disconnected, test_config("postgres://unused"))
}

pub fn offline_app() -> Router {
    create_app(offline_state())
}

/// Connects to `TEST_DATABASE_URL` (or `DATABASE_URL`) and applies migrations.
/// Returns `None` when neither is set so database flows can be skipped.
pub async fn db_state() -> anyhow::Result<Option<AppState>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run database flows.");
            return Ok(None);
        }
    };

    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;
    Ok(Some(AppState::new(orm, test_config(&database_url))))
}

pub fn user_model(id: i32, is_staff: bool, can_cancel_order: bool) -> UserModel {
    UserModel {
        id,
        email: format!("user{id}@example.com"),
        username: format!("user{id}"),
        first_name: String::new(),
        last_name: String::new(),
        password_hash: "unused".into(),
        is_staff,
        can_cancel_order,
        created_at: chrono::Utc::now().into(),
    }
}

pub fn bearer(user: &UserModel) -> String {
    let token = issue_token(TEST_SECRET, 1, user).expect("token");
    format!("Bearer {token}")
}

/// Inserts a user with a unique username/email and returns it with its auth context.
pub async fn create_user(
    state: &AppState,
    is_staff: bool,
    can_cancel_order: bool,
) -> anyhow::Result<(UserModel, AuthUser)> {
    let tag = Uuid::new_v4().simple().to_string();
    let user = UserActive {
        id: NotSet,
        email: Set(format!("{tag}@example.com")),
        username: Set(format!("user_{tag}")),
        first_name: Set(String::new()),
        last_name: Set(String::new()),
        password_hash: Set("dummy".into()),
        is_staff: Set(is_staff),
        can_cancel_order: Set(can_cancel_order),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let auth = AuthUser {
        user_id: user.id,
        is_staff,
        can_cancel_order,
    };
    Ok((user, auth))
}

pub async fn send(
    app: Router,
    method: &str,
    uri: &str,
    auth: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}
