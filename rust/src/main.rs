#![cfg_attr(
    all(target_os = "windows", not(debug_assertions)),
    windows_subsystem = "windows"
)]

#[cfg(target_os = "windows")]
mod windows_app;

#[cfg(target_os = "windows")]
fn main() -> anyhow::Result<()> {
    vision_prompt::bootstrap::init_logging();
    windows_app::run()
}

#[cfg(not(target_os = "windows"))]
fn main() -> anyhow::Result<()> {
    use anyhow::Context;
    use vision_prompt::bootstrap::{init_logging, launch, LaunchArgs};

    init_logging();
    let mut launched = launch(LaunchArgs::from_env())?;
    log::info!("open {} in a browser; Ctrl-C to quit", launched.url());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build signal runtime")?;
    runtime
        .block_on(tokio::signal::ctrl_c())
        .context("failed to wait for Ctrl-C")?;

    launched.server.stop();
    Ok(())
}
