//! HTTP surface: task routes under the configured prefix plus the root and health endpoints.

mod error;
mod handlers;
mod middleware;
mod models;
mod state;

pub use error::{ApiError, ApiErrorBody, ApiErrorMessage, codes};
pub use middleware::RequestContext;
pub use state::HttpState;

use axum::{Router, middleware as axum_middleware, routing::get};

use middleware::{log_responses, set_request_context};

/// Build the full router. `api_prefix` is either `/` or a rooted path without trailing slash.
pub fn build_router(state: HttpState, api_prefix: &str) -> Router {
    let tasks = Router::new()
        .route(
            "/tasks",
            get(handlers::list_tasks).post(handlers::create_task),
        )
        .route(
            "/tasks/{id}",
            get(handlers::get_task)
                .put(handlers::update_task)
                .delete(handlers::delete_task),
        );

    let api = if api_prefix == "/" {
        tasks
    } else {
        Router::new().nest(api_prefix, tasks)
    };

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .merge(api)
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
