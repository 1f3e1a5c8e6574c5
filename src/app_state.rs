//! Implements a struct that holds the state of the REST server.

use axum::extract::FromRef;

use crate::LedgerStore;

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The store that every endpoint reads from and writes to.
    pub store: LedgerStore,
}

impl AppState {
    /// Create a new [AppState] around an opened `store`.
    pub fn new(store: LedgerStore) -> Self {
        Self { store }
    }
}

impl FromRef<AppState> for LedgerStore {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}
