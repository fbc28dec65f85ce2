//! Completion notifications.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::playback::find_program;

/// Players tried in order for the notification sound.
pub const SOUND_PLAYERS: &[&str] = &["aplay", "paplay", "cvlc", "ffplay", "mpg123", "play"];

/// Signals that a download finished. Never fails the caller.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    /// Announce that `title` completed.
    fn notify(&self, title: &str);
}

/// Notifier that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn notify(&self, _title: &str) {}
}

/// Plays a sound file with the first available player, or rings the
/// terminal bell.
#[derive(Debug, Clone)]
pub struct SoundNotifier {
    enabled: bool,
    sound_file: PathBuf,
    players: Vec<String>,
}

impl SoundNotifier {
    /// Notifier honouring `notification_sound` and `notification_sound_file`.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            enabled: config.notification_sound,
            sound_file: config.notification_sound_file.clone(),
            players: SOUND_PLAYERS.iter().map(ToString::to_string).collect(),
        }
    }

    /// Override the player search list.
    #[must_use]
    pub fn with_players(mut self, players: Vec<String>) -> Self {
        self.players = players;
        self
    }

    fn bell() {
        let mut stderr = std::io::stderr();
        let _ = stderr.write_all(b"\x07");
        let _ = stderr.flush();
    }

    /// Spawn the first available player. Returns whether one was started.
    fn spawn_player(&self) -> bool {
        if !self.sound_file.is_file() {
            debug!("Notification sound {} not found", self.sound_file.display());
            return false;
        }
        let Some(player) = self.players.iter().find_map(|name| find_program(name)) else {
            return false;
        };

        match Command::new(&player)
            .arg(&self.sound_file)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(mut child) => {
                // Reap in the background; the caller never waits for the sound.
                std::thread::spawn(move || {
                    let _ = child.wait();
                });
                true
            }
            Err(e) => {
                warn!(
                    context = "Notification",
                    "Failed to start {}: {}",
                    player.display(),
                    e
                );
                false
            }
        }
    }
}

impl Notifier for SoundNotifier {
    fn notify(&self, title: &str) {
        if !self.enabled {
            return;
        }
        debug!("Notifying completion of {}", title);
        if !self.spawn_player() {
            Self::bell();
        }
    }
}
