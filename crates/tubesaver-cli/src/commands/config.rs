//! Configuration commands.

use tracing::info;
use tubesaver_core::Result;

use super::state::AppState;

/// `tubesaver config show`: the current configuration as JSON.
pub fn show(state: &AppState) -> Result<bool> {
    let config = state.config_manager.snapshot();
    println!("{}", serde_json::to_string_pretty(config.as_ref())?);
    Ok(true)
}

/// `tubesaver config set <key> <value>`.
pub fn set(state: &AppState, key: &str, value: &str) -> Result<bool> {
    state.config_manager.set(key, value)?;
    info!("Set {} = {}", key, value);
    println!("Updated {key}");
    Ok(true)
}

/// `tubesaver config reset`.
pub fn reset(state: &AppState) -> Result<bool> {
    state.config_manager.reset()?;
    println!("Configuration reset to defaults");
    Ok(true)
}

/// `tubesaver config path`.
pub fn path(state: &AppState) -> Result<bool> {
    println!("{}", state.paths.config_file().display());
    Ok(true)
}
