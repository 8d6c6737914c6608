//! HTTP API
//!
//! | route                          | handler                  |
//! |--------------------------------|--------------------------|
//! | `GET /`                        | health                   |
//! | `POST /publish`                | publish a JSON message   |
//! | `GET /queue/{name}/info`       | message/consumer counts  |
//! | `GET /queue/{name}/peek`       | read without removing    |
//! | `POST /queue/{name}/consume`   | read and acknowledge     |
//! | `GET /services`                | bound platform services  |
//! | `GET /tls-config`              | TLS status report        |

mod routes;
mod state;

pub use routes::{CountQuery, PublishRequest};
pub use state::{AppState, SERVICE_NAME};

use std::future::Future;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::Result;

/// Build the router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::health))
        .route("/publish", post(routes::publish))
        .route("/queue/{name}/info", get(routes::queue_info))
        .route("/queue/{name}/peek", get(routes::peek))
        .route("/queue/{name}/consume", post(routes::consume))
        .route("/services", get(routes::services))
        .route("/tls-config", get(routes::tls_config))
        .with_state(state)
}

/// Bind the listener
pub async fn bind(config: &ServerConfig) -> Result<TcpListener> {
    let addr = format!("{}:{}", config.listen_address, config.listen_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP listener bound");
    Ok(listener)
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("HTTP server stopped");
    Ok(())
}
