pub mod config;
pub mod dto;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

use crate::config::Config;
use crate::services::{dispatch_service::Dispatcher, llm_service::Backends};
use reqwest::Client;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub http_client: Client,
    pub dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(config: Config) -> error::Result<Self> {
        let http_client = Client::builder()
            .timeout(config.llm.http_timeout)
            .build()?;
        let backends = Backends::from_settings(&config.llm, http_client.clone());
        Ok(Self::with_backends(config, http_client, backends))
    }

    /// Wires explicit capabilities instead of the HTTP ones built from `config.llm`.
    pub fn with_backends(config: Config, http_client: Client, backends: Backends) -> Self {
        let dispatcher = Dispatcher::new(&config, backends);
        Self {
            config: Arc::new(config),
            http_client,
            dispatcher,
        }
    }
}
