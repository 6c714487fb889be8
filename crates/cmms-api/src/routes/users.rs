//! # User API
//!
//! Read-only listing of the accounts tasks can be assigned to.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use cmms_core::User;

use crate::state::AppState;

/// Build the users router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/users", get(list_users))
}

/// GET /v1/users — List users.
#[utoipa::path(
    get,
    path = "/v1/users",
    responses(
        (status = 200, description = "All users, ordered by username", body = Vec<User>),
    ),
    tag = "users"
)]
async fn list_users(State(state): State<AppState>) -> Json<Vec<User>> {
    let mut users = state.users.list();
    users.sort_by(|a, b| a.username.cmp(&b.username));
    Json(users)
}
