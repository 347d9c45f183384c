use axum::extract::FromRef;

use crate::db::Database;
use crate::flows::Flows;

/// Shared state for every route.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub flows: Flows,
}

impl AppState {
    pub fn new(db: Database, flows: Flows) -> Self {
        Self { db, flows }
    }
}

impl FromRef<AppState> for Database {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for Flows {
    fn from_ref(state: &AppState) -> Self {
        state.flows.clone()
    }
}
