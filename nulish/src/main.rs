mod config;

mod app;
mod cache;
mod ctx;
mod db;
mod debounce;
mod errors;
mod events;
mod notes;
mod openapi;
mod state;
mod store;
mod sync;
mod tags;
mod telemetry;

use std::net::SocketAddr;

use aide::axum::ApiRouter;
use app::AppParams;
pub use config::config;
pub use db::{init_db, DB};
pub use errors::{Error, Result};
use state::AppState;
use tokio::net::TcpListener;

/// Every `/api/v1` route.
pub fn api_router(state: AppState) -> ApiRouter {
    ApiRouter::new()
        .merge(notes::router(state.clone()))
        .merge(tags::router(state.clone()))
        .merge(events::router(state))
}

#[tokio::main]
async fn main() -> errors::Result<()> {
    let config = config::init()?;

    telemetry::setup_tracing(config.log_json);

    let conn = init_db().await?;
    let state = AppState::from_config(conn, config);

    let (app, _) = app::create(AppParams {
        state,
        router: api_router,
    })
    .await?;

    let app = telemetry::add_tracing_layer(app);

    let port = config.port;
    let listener = TcpListener::bind(format!("127.0.0.1:{port}")).await?;

    tracing::info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

#[cfg(test)]
pub mod tests {
    use std::sync::Arc;

    use crate::{
        app::{create, AppParams},
        config::{config_override, Config},
        db::init_test_db,
        errors::{Error, Result},
        events::Notifier,
        state::AppState,
        store::SqliteStore,
    };
    use aide::axum::ApiRouter;
    use axum_test::{TestServer, TestServerBuilder};

    fn test_config() -> &'static Config {
        config_override(|config| Config {
            save_debounce_ms: 20,
            ..config
        })
    }

    /// Fresh in-memory database behind the relational store.
    pub async fn test_state() -> Result<AppState> {
        let db = init_test_db().await?;
        Ok(AppState::new(
            Arc::new(SqliteStore::new(db)),
            Notifier::default(),
            test_config(),
        ))
    }

    pub async fn test_app(state: AppState) -> Result<axum::Router> {
        let (app, _) = create(AppParams {
            state,
            router: crate::api_router,
        })
        .await?;
        Ok(app)
    }

    pub async fn test_server<R>(state: AppState, router: R) -> Result<TestServer>
    where
        R: FnOnce(AppState) -> ApiRouter,
    {
        test_config();

        let (app, _) = create(AppParams { state, router }).await?;

        let config = TestServerBuilder::new()
            .expect_success_by_default()
            .mock_transport()
            .into_config();

        TestServer::new_with_config(app, config).map_err(|e| Error::Unexpected(e.to_string()))
    }
}
