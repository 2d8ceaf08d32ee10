//! Web layer: a thin axum surface over [`crate::scheduler::Scheduler`],
//! laid out the way the teacher splits routing (`web::mod`) from handlers
//! (`web::handlers`).

pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::scheduler::Scheduler;

/// Shared across all handlers; cheap to clone (one `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
}

pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(config: &Config, scheduler: Arc<Scheduler>) -> Result<Self> {
        let app = Self::create_router(AppState { scheduler });
        let addr: SocketAddr = format!("{}:{}", config.web.host, config.web.port).parse()?;
        Ok(Self { app, addr })
    }

    fn create_router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(handlers::health::health_check))
            .route("/health/detailed", get(handlers::health::detailed_health_check))
            .route("/ready", get(handlers::health::readiness_check))
            .route("/live", get(handlers::health::liveness_check))
            .nest("/api/v1", Self::api_v1_routes())
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    fn api_v1_routes() -> Router<AppState> {
        Router::new()
            .route("/vote", post(handlers::vote))
            .route("/queue", get(handlers::queue).delete(handlers::remove))
            .route("/queue/clear", post(handlers::clear))
            .route("/queue/count", get(handlers::queue_count))
            .route("/advance", post(handlers::advance))
            .route("/now-playing", get(handlers::now_playing))
    }

    pub async fn serve(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(listener, self.app).await?;
        Ok(())
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}
