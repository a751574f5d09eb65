//! Server construction and wiring.
//!
//! Builds the actix-web application from a [`ServerConfig`]: store pool,
//! domain services, HTTP state, routes, and (in debug builds) Swagger UI.

mod config;

pub use config::ServerConfig;

use std::sync::Arc;

use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};
use mockable::{Clock, DefaultClock};
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

#[cfg(debug_assertions)]
use crate::ApiDoc;
use crate::domain::ports::FixtureIdentityProvider;
use crate::domain::{DeltaSelector, Reconciler, UserId};
use crate::inbound::http::health::{HealthState, live, ready};
use crate::inbound::http::state::HttpState;
use crate::inbound::http::sync::{pull_sync, push_sync, sync_status};
use crate::outbound::analytics::TracingAnalyticsDispatcher;
use crate::outbound::persistence::{DbPool, DieselSyncStore, PoolConfig};

/// Build the HTTP dependency bundle from a store pool and configuration.
fn build_http_state(pool: DbPool, config: &ServerConfig) -> HttpState {
    let store = Arc::new(DieselSyncStore::new(pool));
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let analytics = Arc::new(TracingAnalyticsDispatcher);

    HttpState::new(
        Arc::new(Reconciler::new(
            Arc::clone(&store),
            analytics,
            Arc::clone(&clock),
        )),
        Arc::new(DeltaSelector::new(store, clock)),
        Arc::new(FixtureIdentityProvider::new(
            config.api_bearer_token.clone(),
            UserId::new(config.api_user_id),
        )),
    )
}

/// Assemble the application with routes and shared state.
pub fn build_app(
    http_state: web::Data<HttpState>,
    health_state: web::Data<HealthState>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let app = App::new()
        .app_data(http_state)
        .app_data(health_state)
        .service(live)
        .service(ready)
        .service(
            web::scope("/sync")
                .service(push_sync)
                .service(pull_sync)
                .service(sync_status),
        );

    #[cfg(debug_assertions)]
    let app = app.service(
        SwaggerUi::new("/docs/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    app
}

/// Create the store pool, wire the application, and start the HTTP server.
///
/// # Errors
///
/// Returns [`std::io::Error`] when the pool cannot be built or the listen
/// address cannot be bound.
pub async fn run(config: ServerConfig) -> std::io::Result<Server> {
    let pool = DbPool::new(
        PoolConfig::new(config.database_url.clone()).with_max_size(config.db_pool_max),
    )
    .await
    .map_err(|err| std::io::Error::other(format!("store pool init failed: {err}")))?;

    let http_state = web::Data::new(build_http_state(pool, &config));
    let health_state = web::Data::new(HealthState::new());
    health_state.mark_ready();

    let server_http_state = http_state.clone();
    let server_health_state = health_state.clone();
    let server = HttpServer::new(move || {
        build_app(server_http_state.clone(), server_health_state.clone())
    })
    .bind(config.bind_addr)?
    .run();

    Ok(server)
}
