//! Router assembly for each deployable service.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::TokenCodec;
use crate::config::{AppConfig, Environment, StorageBackend};
use crate::database::models::{Event, Note, Task, UserPreferences};
use crate::database::{DatabaseManager, MemoryStore, MemoryUserStore, OwnedStore, PgStore, PgUserStore, Table, UserStore};
use crate::gateway::{proxy, GatewayState};
use crate::handlers::{self, health, owned};
use crate::middleware::{jwt_auth_middleware, AuthState};
use crate::ownership::OwnedRecord;
use crate::services::events::{CreateEvent, UpdateEvent};
use crate::services::notes::{CreateNote, UpdateNote};
use crate::services::{EventService, HttpOwnedDataClient, NoteService, OwnedResourceService, TaskService, UserService};
use crate::types::ServiceKind;

/// Gateway: JWT filter in front of the proxy, CORS outermost so preflights skip auth
pub fn gateway_router(config: &AppConfig, codec: Arc<TokenCodec>) -> Result<Router, reqwest::Error> {
    let state = GatewayState::from_config(config)?;

    let router = Router::new()
        .route("/health", get(health::gateway))
        .fallback(proxy::forward)
        .with_state(state)
        .layer(from_fn_with_state(AuthState::new(codec), jwt_auth_middleware));

    let router = match cors_layer(config) {
        Some(cors) => router.layer(cors),
        None => router,
    };

    Ok(router.layer(TraceLayer::new_for_http()))
}

fn cors_layer(config: &AppConfig) -> Option<CorsLayer> {
    if !config.security.enable_cors {
        return None;
    }
    if config.environment == Environment::Development {
        return Some(CorsLayer::permissive());
    }

    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

pub fn notes_router(service: NoteService) -> Router {
    Router::new()
        .route(
            "/health",
            get(|State(service): State<NoteService>| async move {
                health::report(ServiceKind::Notes, service.ping().await)
            }),
        )
        .route(
            "/api/notes",
            get(owned::list::<Note>)
                .post(owned::create::<Note, CreateNote>)
                .delete(owned::delete_all::<Note>),
        )
        .route(
            "/api/notes/:id",
            get(owned::show::<Note>)
                .put(owned::update::<Note, UpdateNote>)
                .delete(owned::delete::<Note>),
        )
        .with_state(service)
        .layer(TraceLayer::new_for_http())
}

pub fn events_router(service: EventService) -> Router {
    Router::new()
        .route(
            "/health",
            get(|State(service): State<EventService>| async move {
                health::report(ServiceKind::Events, service.ping().await)
            }),
        )
        .route(
            "/api/events",
            get(owned::list::<Event>)
                .post(owned::create::<Event, CreateEvent>)
                .delete(owned::delete_all::<Event>),
        )
        .route(
            "/api/events/:id",
            get(owned::show::<Event>)
                .put(owned::update::<Event, UpdateEvent>)
                .delete(owned::delete::<Event>),
        )
        .with_state(service)
        .layer(TraceLayer::new_for_http())
}

pub fn tasks_router(service: TaskService) -> Router {
    use handlers::tasks;

    Router::new()
        .route(
            "/health",
            get(|State(service): State<TaskService>| async move {
                health::report(ServiceKind::Tasks, service.ping().await)
            }),
        )
        .route(
            "/api/tasks",
            get(tasks::list).post(tasks::create).delete(tasks::delete_all),
        )
        .route("/api/tasks/today", get(tasks::today))
        .route("/api/tasks/overdue", get(tasks::overdue))
        .route("/api/tasks/week", get(tasks::week))
        .route(
            "/api/tasks/:id",
            get(tasks::show).put(tasks::update).delete(tasks::delete),
        )
        .route("/api/tasks/:id/complete", put(tasks::complete))
        .route("/api/tasks/:id/status", put(tasks::set_status))
        .route("/api/tasks/:id/subtasks", get(tasks::subtasks))
        .with_state(service)
        .layer(TraceLayer::new_for_http())
}

pub fn users_router(service: UserService) -> Router {
    use handlers::{auth, users};

    Router::new()
        .route(
            "/health",
            get(|State(service): State<UserService>| async move {
                health::report(ServiceKind::Users, service.ping().await)
            }),
        )
        // Public
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        // Requester from X-User-Id
        .route(
            "/api/users/me",
            get(users::me).put(users::update_me).delete(users::delete_me),
        )
        .route("/api/users/me/password", put(users::change_password))
        .route("/api/users/me/deactivate", put(users::deactivate))
        .route(
            "/api/users/me/preferences",
            get(users::preferences).put(users::update_preferences),
        )
        .route("/api/users/:id", get(users::show))
        .with_state(service)
        .layer(TraceLayer::new_for_http())
}

/// Storage handles for one service process
struct Storage {
    database: Option<DatabaseManager>,
}

impl Storage {
    async fn open(kind: ServiceKind, config: &AppConfig) -> anyhow::Result<Self> {
        if config.database.storage == StorageBackend::Memory {
            tracing::warn!("{} is using in-memory storage; data is lost on restart", kind);
            return Ok(Self { database: None });
        }

        let database = DatabaseManager::from_config(&config.database)?;
        if config.database.run_migrations {
            database.migrate(kind).await?;
        }
        Ok(Self {
            database: Some(database),
        })
    }

    async fn owned<R>(&self, kind: ServiceKind) -> anyhow::Result<Arc<dyn OwnedStore<R>>>
    where
        R: OwnedRecord + Table + Unpin,
    {
        let store: Arc<dyn OwnedStore<R>> = match &self.database {
            Some(db) => Arc::new(PgStore::<R>::new(db.service_pool(kind).await?)),
            None => Arc::new(MemoryStore::<R>::new()),
        };
        Ok(store)
    }

    async fn users(&self) -> anyhow::Result<Arc<dyn UserStore>> {
        let store: Arc<dyn UserStore> = match &self.database {
            Some(db) => Arc::new(PgUserStore::new(db.service_pool(ServiceKind::Users).await?)),
            None => Arc::new(MemoryUserStore::new()),
        };
        Ok(store)
    }
}

/// Build the router for `kind` with its stores wired from configuration
pub async fn build(kind: ServiceKind, config: &AppConfig) -> anyhow::Result<Router> {
    let codec = Arc::new(TokenCodec::from_config(&config.security)?);

    let router = match kind {
        ServiceKind::Gateway => gateway_router(config, codec)?,
        ServiceKind::Notes => {
            let storage = Storage::open(kind, config).await?;
            notes_router(OwnedResourceService::new(storage.owned::<Note>(kind).await?))
        }
        ServiceKind::Events => {
            let storage = Storage::open(kind, config).await?;
            events_router(OwnedResourceService::new(storage.owned::<Event>(kind).await?))
        }
        ServiceKind::Tasks => {
            let storage = Storage::open(kind, config).await?;
            tasks_router(TaskService::new(storage.owned::<Task>(kind).await?))
        }
        ServiceKind::Users => {
            let storage = Storage::open(kind, config).await?;
            let timeout = Duration::from_secs(config.gateway.request_timeout_secs);
            let purge_clients = HttpOwnedDataClient::for_services(&config.services, timeout)?;
            users_router(UserService::new(
                storage.users().await?,
                storage.owned::<UserPreferences>(kind).await?,
                codec,
                purge_clients,
            ))
        }
    };
    Ok(router)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    fn notes() -> Router {
        notes_router(OwnedResourceService::new(Arc::new(MemoryStore::<Note>::new())))
    }

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn as_user(method: &str, uri: &str, user: Uuid, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-user-id", user.to_string());
        match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    #[tokio::test]
    async fn notes_health_is_up() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = call(notes(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "notes");
    }

    #[tokio::test]
    async fn owner_comes_from_header_and_is_enforced() {
        let app = notes();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let (status, note) = call(
            app.clone(),
            as_user("POST", "/api/notes", alice, Some(json!({"title": "mine", "owner_id": bob}))),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(note["owner_id"], alice.to_string());

        let uri = format!("/api/notes/{}", note["id"].as_str().unwrap());
        let (status, body) = call(app.clone(), as_user("GET", &uri, bob, None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Unauthorized Access");

        let (status, _) = call(app.clone(), as_user("DELETE", &uri, alice, None)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = call(app, as_user("GET", &uri, alice, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn bad_inputs_use_the_error_body() {
        let app = notes();

        let request = Request::builder().uri("/api/notes").body(Body::empty()).unwrap();
        let (status, body) = call(app.clone(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Missing X-User-Id header");

        let (status, body) = call(app.clone(), as_user("GET", "/api/notes/not-a-uuid", Uuid::new_v4(), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid path parameter");

        let (status, body) = call(app, as_user("POST", "/api/notes", Uuid::new_v4(), Some(json!({})))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"]["title"], "Title is required");
    }

    #[tokio::test]
    async fn task_status_requires_a_known_value() {
        let app = tasks_router(TaskService::new(Arc::new(MemoryStore::<Task>::new())));
        let user = Uuid::new_v4();

        let (status, task) = call(app.clone(), as_user("POST", "/api/tasks", user, Some(json!({"title": "t"})))).await;
        assert_eq!(status, StatusCode::CREATED);

        let uri = format!("/api/tasks/{}/status?status=SOMEDAY", task["id"].as_str().unwrap());
        let (status, _) = call(app, as_user("PUT", &uri, user, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn overdue_view_is_scoped_to_the_requester() {
        let app = tasks_router(TaskService::new(Arc::new(MemoryStore::<Task>::new())));
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let yesterday = (chrono::Utc::now() - chrono::Duration::days(1)).to_rfc3339();

        for owner in [alice, bob] {
            let payload = json!({"title": "late", "due_date": yesterday});
            let (status, _) = call(app.clone(), as_user("POST", "/api/tasks", owner, Some(payload))).await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, body) = call(app.clone(), as_user("GET", "/api/tasks/overdue", alice, None)).await;
        assert_eq!(status, StatusCode::OK);
        let tasks = body.as_array().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0]["owner_id"], alice.to_string());

        let (status, body) = call(app, as_user("GET", "/api/tasks/week", alice, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.as_array().unwrap().is_empty());
    }
}
