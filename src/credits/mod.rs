use axum::Router;

use crate::state::AppState;

pub mod handlers;
mod ledger;

pub use ledger::{CreditLedger, CreditStatus, DEFAULT_DAILY_LIMIT};

pub fn router() -> Router<AppState> {
    handlers::router()
}
