//! Application state wiring configuration, providers and the engine.

use std::path::{Path, PathBuf};

use anyhow::Context;

use handson_core::dispatch::DispatchEngine;
use handson_infra::config::{load_config, load_dotenv, resolve_data_dir};
use handson_infra::llm::load_registry;
use handson_types::config::GlobalConfig;

/// Everything a command handler needs.
pub struct AppState {
    pub engine: DispatchEngine,
    pub config: GlobalConfig,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Load `.env`, read the configuration and build the engine.
    pub async fn init(config_path: Option<&Path>) -> anyhow::Result<Self> {
        load_dotenv();
        let data_dir = resolve_data_dir();

        let config = load_config(config_path, &data_dir)
            .await
            .context("failed to load configuration")?;

        let registry = load_registry(&config);
        let engine = DispatchEngine::from_registry(config.dispatch.clone(), registry);

        Ok(Self {
            engine,
            config,
            data_dir,
        })
    }
}
