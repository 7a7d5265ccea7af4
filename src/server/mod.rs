//! Server construction and wiring.

mod config;

pub use config::AppConfig;

use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{web, App, HttpServer};
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

#[cfg(debug_assertions)]
use crate::doc::ApiDoc;
use crate::inbound::http::health::{health, HealthState};
use crate::inbound::http::state::HttpState;
use crate::inbound::http::{accounts, transactions};

fn build_app(
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
        .service(health)
        .service(accounts::create_account)
        .service(accounts::get_account)
        .service(transactions::create_transaction)
        .service(transactions::get_transaction)
        .service(transactions::list_transactions);

    #[cfg(debug_assertions)]
    let app = app.service(
        SwaggerUi::new("/docs/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    app
}

/// Construct the HTTP server and mark the service ready once it is bound.
///
/// # Errors
///
/// Propagates [`std::io::Error`] when binding the socket fails.
pub fn create_server(
    state: HttpState,
    health_state: web::Data<HealthState>,
    port: u16,
) -> std::io::Result<Server> {
    let http_state = web::Data::new(state);
    let server_health_state = health_state.clone();

    let server = HttpServer::new(move || {
        build_app(http_state.clone(), server_health_state.clone())
    })
    .bind(("0.0.0.0", port))?
    .run();

    health_state.mark_ready();
    Ok(server)
}
