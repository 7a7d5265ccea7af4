//! Health endpoint for orchestration and load balancers.

use std::sync::atomic::{AtomicBool, Ordering};

use actix_web::{get, web, HttpResponse};
use serde_json::json;

/// Readiness flag flipped once the server is wired and bound.
#[derive(Default)]
pub struct HealthState {
    ready: AtomicBool,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Relaxed);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }
}

/// Health check: 200 once the service is ready to handle traffic.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Service is starting up")
    ),
    tags = ["health"],
    operation_id = "health"
)]
#[get("/health")]
pub async fn health(state: web::Data<HealthState>) -> HttpResponse {
    if state.is_ready() {
        HttpResponse::Ok().json(json!({ "status": "ok" }))
    } else {
        HttpResponse::ServiceUnavailable().finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test as actix_test, App};

    #[actix_web::test]
    async fn health_reports_ok_when_ready() {
        let state = web::Data::new(HealthState::new());
        state.mark_ready();
        let app =
            actix_test::init_service(App::new().app_data(state.clone()).service(health)).await;

        let response =
            actix_test::call_service(&app, actix_test::TestRequest::get().uri("/health").to_request())
                .await;
        assert!(response.status().is_success());
        let body: serde_json::Value = actix_test::read_body_json(response).await;
        assert_eq!(body["status"], "ok");
    }

    #[actix_web::test]
    async fn health_is_unavailable_before_ready() {
        let state = web::Data::new(HealthState::new());
        let app =
            actix_test::init_service(App::new().app_data(state.clone()).service(health)).await;

        let response =
            actix_test::call_service(&app, actix_test::TestRequest::get().uri("/health").to_request())
                .await;
        assert_eq!(response.status(), actix_web::http::StatusCode::SERVICE_UNAVAILABLE);
    }
}
