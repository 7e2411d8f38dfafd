//! HTTP routes: GraphQL over POST, subscriptions over WebSocket, health and SDL

use actix_web::{web, HttpRequest, HttpResponse};
use async_graphql_actix_web::{GraphQLRequest, GraphQLResponse, GraphQLSubscription};

use crate::schema::AppSchema;

async fn graphql_handler(schema: web::Data<AppSchema>, req: GraphQLRequest) -> GraphQLResponse {
    schema.execute(req.into_inner()).await.into()
}

async fn graphql_subscription_handler(
    schema: web::Data<AppSchema>,
    req: HttpRequest,
    payload: web::Payload,
) -> actix_web::Result<HttpResponse> {
    GraphQLSubscription::new(schema.as_ref().clone()).start(&req, payload)
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn schema_handler(schema: web::Data<AppSchema>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain")
        .body(schema.sdl())
}

/// Registers every route; the schema must be supplied as `web::Data`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    for path in ["/query", "/graphql"] {
        cfg.route(path, web::post().to(graphql_handler))
            .route(path, web::get().to(graphql_subscription_handler));
    }
    cfg.route("/health", web::get().to(health_handler))
        .route("/schema", web::get().to(schema_handler));
}
