use axum::Router;

use crate::state::SharedState;

pub mod docs;
pub mod health;
pub mod websocket;

/// Compose the health, lobby socket and documentation routes over the shared state.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(websocket::router())
        .merge(docs::router())
        .with_state(state)
}
