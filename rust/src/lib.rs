pub mod bootstrap;
pub mod config_store;
pub mod data_url;
pub mod history_store;
pub mod main_ui_html;
pub mod path_utils;
pub mod prompt_client;
pub mod renderer;
pub mod server;
pub mod session;
pub mod storage;
pub mod workspace;
