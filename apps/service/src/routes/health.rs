use actix_web::{HttpResponse, Responder, get};

macros_utils::routes! {
    route root_route,
    route health_route,
}

/// Liveness only: answers while the process is up, regardless of monitored services.
#[get("/")]
pub async fn root_route() -> impl Responder {
    HttpResponse::Ok().content_type("text/plain").body("OK")
}

#[get("/health")]
pub async fn health_route() -> impl Responder {
    HttpResponse::Ok().content_type("text/plain").body("OK")
}
