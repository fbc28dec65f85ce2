//! Subcommand handlers for the `tubesaver` binary.
//!
//! Each handler prints its own status lines and returns whether the process
//! should exit successfully. Errors are reported by `main`.
//!
//! This module is organized into submodules by feature area:
//! - `state`: stores and settings shared by every handler
//! - `download`: single, playlist and batch downloads
//! - `library`: history and playback
//! - `config`: application configuration
//! - `cookies`: cookie store management

mod config;
mod cookies;
mod download;
mod library;
mod state;

pub use state::AppState;

use tubesaver_core::{MediaKind, Result};

use crate::cli::{Commands, ConfigAction, CookiesAction, HistoryAction};

const fn media_kind(video: bool) -> MediaKind {
    if video { MediaKind::Video } else { MediaKind::Audio }
}

/// Run one parsed subcommand.
pub fn run(state: &AppState, command: Commands) -> Result<bool> {
    match command {
        Commands::Audio { url, items } => download::download(state, &url, MediaKind::Audio, items),
        Commands::Video { url, items } => download::download(state, &url, MediaKind::Video, items),
        Commands::Playlist { url, video } => download::playlist(state, &url, media_kind(video)),
        Commands::Batch { file, video } => download::batch(state, &file, media_kind(video)),
        Commands::Play { url } => library::play_online(state, &url),
        Commands::PlayLocal { all } => library::play_local(state, all),
        Commands::History { action } => match action {
            HistoryAction::List => library::history_list(state),
            HistoryAction::Remove { positions } => library::history_remove(state, &positions),
            HistoryAction::Clear => library::history_clear(state),
        },
        Commands::Config { action } => match action {
            ConfigAction::Show => config::show(state),
            ConfigAction::Set { key, value } => config::set(state, &key, &value),
            ConfigAction::Reset => config::reset(state),
            ConfigAction::Path => config::path(state),
        },
        Commands::Cookies { action } => match action {
            CookiesAction::Validate => cookies::validate(state),
            CookiesAction::Expiry => cookies::expiry(state),
            CookiesAction::Path => cookies::path(state),
            CookiesAction::Replace => cookies::replace(state),
            CookiesAction::Import { path } => cookies::import(state, &path),
            CookiesAction::Export { path } => cookies::export(state, &path),
            CookiesAction::Delete => cookies::delete(state),
        },
    }
}
