pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
pub mod utils;

use std::sync::Arc;

use crate::services::{link_service::LinkService, session_service::SessionService};
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub link_service: LinkService,
    pub session_service: SessionService,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let config = crate::config::get_config();

        let link_service = LinkService::new(store.clone(), config.webapp_url.clone());
        let session_service = SessionService::new(store.clone());

        Self {
            store,
            link_service,
            session_service,
        }
    }
}
