//! Process startup shared by the desktop shell and the headless launcher.

use anyhow::{Context, Result};
use std::env;
use std::sync::Arc;

use crate::config_store::ConfigStore;
use crate::history_store::HistoryStore;
use crate::path_utils::{get_base_dir, resolve_config_path};
use crate::prompt_client::{ChatCompletionsClient, PromptProvider};
use crate::server::{AppServer, AppState};
use crate::storage::FileStorage;
use crate::workspace::Workspace;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LaunchArgs {
    pub config: Option<String>,
}

impl LaunchArgs {
    pub fn from_env() -> Self {
        Self::parse(env::args().skip(1))
    }

    pub fn parse<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = None;
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            if arg == "--config" {
                if let Some(value) = args.next() {
                    config = Some(value);
                }
            } else if let Some(value) = arg.strip_prefix("--config=") {
                config = Some(value.to_string());
            }
        }

        Self { config }
    }
}

pub struct Launched {
    pub server: AppServer,
}

impl Launched {
    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}/", self.server.port())
    }
}

/// `RUST_LOG` overrides the default `info` filter.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}

pub fn launch(args: LaunchArgs) -> Result<Launched> {
    let base_dir = get_base_dir();
    let config_path = resolve_config_path(args.config, &base_dir);

    let config = ConfigStore::new(config_path.clone())
        .with_context(|| format!("config error: {}", config_path.display()))?;
    log::info!("using config {}", config.path.display());

    let data_dir = config.data_dir();
    let storage = FileStorage::new(data_dir.clone())
        .with_context(|| format!("history storage error: {}", data_dir.display()))?;
    log::info!("history stored under {}", storage.root().display());
    let history = HistoryStore::load(Box::new(storage), config.history_limit());
    log::info!("loaded {} history item(s)", history.len());

    let settings = config.provider_settings();
    log::info!(
        "provider: model={} endpoint={} key env={}",
        settings.model,
        settings.endpoint,
        settings.api_key_env
    );
    let provider: Arc<dyn PromptProvider> = Arc::new(ChatCompletionsClient::new(settings));

    let state = Arc::new(AppState::new(
        Workspace::new(history),
        provider,
        config.min_generating(),
        config.confirm_clear(),
    ));
    let server = AppServer::start(state, config.server_port())
        .context("failed to start the UI server")?;

    Ok(Launched { server })
}

#[cfg(test)]
mod tests {
    use super::{launch, LaunchArgs};

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_config_flag_in_both_forms() {
        assert_eq!(
            LaunchArgs::parse(args(&["--config", "a.toml"])).config.as_deref(),
            Some("a.toml")
        );
        assert_eq!(
            LaunchArgs::parse(args(&["--config=b.toml"])).config.as_deref(),
            Some("b.toml")
        );
    }

    #[test]
    fn launch_writes_default_config_and_serves_on_returned_url() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = dir.path().join("config.toml");

        let mut launched = launch(LaunchArgs {
            config: Some(config.to_string_lossy().to_string()),
        })
        .expect("launch");

        assert!(config.exists());
        assert_eq!(
            launched.url(),
            format!("http://127.0.0.1:{}/", launched.server.port())
        );
        std::net::TcpStream::connect(("127.0.0.1", launched.server.port())).expect("connect");
        launched.server.stop();
    }

    #[test]
    fn ignores_unknown_and_dangling_flags() {
        assert_eq!(LaunchArgs::parse(args(&["--verbose", "--config"])), LaunchArgs::default());
    }
}
