//! Shared handler state.

use mfgraph_core::QueryService;

#[derive(Debug, Clone)]
pub struct AppState {
    pub service: QueryService,
}

impl AppState {
    pub fn new(service: QueryService) -> Self {
        Self { service }
    }
}
