use std::{convert::Infallible, path::Path};

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower::util::ServiceExt;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeFile,
    trace::TraceLayer,
};

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod services;

#[derive(Clone)]
pub struct AppState {
    pub db: db::Database,
    pub config: config::Config,
}

impl AppState {
    /// Connects and migrates the store, then seeds the administrator if configured.
    pub async fn connect(config: config::Config) -> anyhow::Result<Self> {
        let db = db::Database::connect(&config.database_url).await?;
        db.run_migrations().await?;

        if let Some(seed) = &config.admin {
            services::auth::ensure_admin(&db.pool, seed).await?;
        }

        Ok(Self { db, config })
    }
}

pub fn app(state: AppState) -> Router {
    // Every project route requires a token; user routes pick their own guards.
    let protected_routes = Router::new()
        .nest("/projects", routes::projects::router(state.clone()))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/users", routes::users::router(state.clone()))
        .merge(protected_routes)
        .fallback(serve_frontend)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn health_check() -> &'static str {
    "OK"
}

fn infallible(res: Result<Response, Infallible>) -> Response {
    match res {
        Ok(response) => response,
        Err(never) => match never {},
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Serves the static frontend: the exact file, then `<path>.html`, then `index.html`.
async fn serve_frontend(State(state): State<AppState>, req: Request<Body>) -> Response {
    let root = Path::new(&state.config.static_dir);
    let relative = req.uri().path().trim_start_matches('/').to_string();

    if !relative.is_empty() && !relative.split('/').any(|segment| segment == "..") {
        for candidate in [root.join(&relative), root.join(format!("{relative}.html"))] {
            if is_file(&candidate).await {
                let res = ServeFile::new(candidate)
                    .oneshot(req)
                    .await
                    .map(IntoResponse::into_response);
                return infallible(res);
            }
        }
    }

    match tokio::fs::read(root.join("index.html")).await {
        Ok(contents) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/html")],
            contents,
        )
            .into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}
