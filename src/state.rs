use crate::products::ProductStore;
use std::sync::Arc;

/// Shared handler state. The store sits behind a capability trait so tests
/// can substitute a fake without a real database.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ProductStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn ProductStore>) -> Self {
        Self { store }
    }
}
