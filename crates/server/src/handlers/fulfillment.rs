//! Dialogue fulfillment endpoint feeding the turn engine.
//!
//! This endpoint never fails outward; the engine maps every internal
//! error to a well-formed response with an apology message.

use axum::extract::State;
use axum::response::Json;

use outdial_core::domain::dialogue::{TurnEvent, TurnResponse};

use crate::handlers::AppState;

pub async fn handle(
    State(state): State<AppState>,
    Json(event): Json<TurnEvent>,
) -> Json<TurnResponse> {
    Json(state.turn_engine.handle_turn(&event).await)
}
