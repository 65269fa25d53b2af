//! Order API module.

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::AppState;

pub fn router() -> Router<AppState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handler::create).get(handler::list_active))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/items", post(handler::add_items))
        .route("/{id}/send", post(handler::send))
        .route("/{id}/payments", post(handler::pay))
        .route("/{id}/items/{item_id}/void", post(handler::void_item))
        .route("/{id}/void", post(handler::void_order))
        .route("/{id}/reopen", post(handler::reopen))
}
