use axum::Router;

use crate::state::AppState;

pub fn configure_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/api/v1", api_routes())
        .nest("/api/v1", crate::modules::media::router(state))
}

fn api_routes() -> Router<AppState> {
    Router::new().route("/health", axum::routing::get(|| async { "ok" }))
}
