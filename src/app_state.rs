use std::sync::Arc;

use crate::services::{queue::JobStore, storage::UploadStore};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn JobStore>,
    pub uploads: Arc<UploadStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn JobStore>, uploads: UploadStore) -> Self {
        Self {
            store,
            uploads: Arc::new(uploads),
        }
    }
}
