//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Download audio and video with yt-dlp, keep a history and play media.
#[derive(Parser, Debug)]
#[command(name = "tubesaver", author, version, about)]
pub struct Cli {
    /// Directory holding config.json, history, cookies and logs.
    #[arg(long = "base-dir", value_name = "PATH", env = "TUBESAVER_HOME", global = true)]
    pub base_dir: Option<PathBuf>,

    /// Debug output on the console and detailed log files.
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// Answer yes to every question (overwrite, whole playlists, clearing).
    #[arg(short = 'y', long = "yes", global = true)]
    pub assume_yes: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Download audio from a URL.
    Audio {
        /// Video or playlist URL.
        url: String,
        /// Playlist items to fetch, e.g. 1,3,5-7.
        #[arg(long, value_name = "SEL")]
        items: Option<String>,
    },
    /// Download video from a URL.
    Video {
        /// Video or playlist URL.
        url: String,
        /// Playlist items to fetch, e.g. 1,3,5-7.
        #[arg(long, value_name = "SEL")]
        items: Option<String>,
    },
    /// List a playlist and pick the entries to download.
    Playlist {
        /// Playlist URL.
        url: String,
        /// Download video instead of audio.
        #[arg(long)]
        video: bool,
    },
    /// Download every URL in a file, one per line, in parallel.
    Batch {
        /// File with one URL per line; `#` starts a comment.
        file: PathBuf,
        /// Download video instead of audio.
        #[arg(long)]
        video: bool,
    },
    /// Stream a URL in the media player.
    Play {
        /// Media URL.
        url: String,
    },
    /// Play downloaded audio from the audio directory.
    PlayLocal {
        /// Play every file in order instead of choosing.
        #[arg(long)]
        all: bool,
    },
    /// Show or edit the download and playback history.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Show or change settings.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Manage stored cookies.
    Cookies {
        #[command(subcommand)]
        action: CookiesAction,
    },
}

/// `history` actions.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum HistoryAction {
    /// Print every entry, oldest first.
    List,
    /// Remove entries by their position in `history list`.
    Remove {
        /// 1-based positions.
        #[arg(required = true, num_args = 1..)]
        positions: Vec<usize>,
    },
    /// Remove every entry.
    Clear,
}

/// `config` actions.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the configuration as JSON.
    Show,
    /// Change one key.
    Set {
        /// Configuration key, e.g. default_audio_format.
        key: String,
        /// New value.
        value: String,
    },
    /// Restore the defaults.
    Reset,
    /// Print the configuration file path.
    Path,
}

/// `cookies` actions.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum CookiesAction {
    /// Check the TikTok and X sessions online.
    Validate,
    /// List cookie expiry dates.
    Expiry,
    /// Print the cookie file path.
    Path,
    /// Replace the cookies with a JSON array read from stdin.
    Replace,
    /// Replace the cookies with a JSON file.
    Import {
        /// JSON file holding an array of cookies.
        path: PathBuf,
    },
    /// Copy the cookie file elsewhere.
    Export {
        /// Destination file.
        path: PathBuf,
    },
    /// Delete the stored cookies.
    Delete,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_audio_with_items() {
        let cli = Cli::try_parse_from([
            "tubesaver",
            "audio",
            "https://youtu.be/abc",
            "--items",
            "1,3",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Commands::Audio {
                url: "https://youtu.be/abc".to_string(),
                items: Some("1,3".to_string()),
            }
        );
        assert!(!cli.assume_yes);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "tubesaver",
            "history",
            "remove",
            "2",
            "5",
            "--base-dir",
            "/tmp/ts",
            "-y",
        ])
        .unwrap();
        assert_eq!(cli.base_dir, Some(PathBuf::from("/tmp/ts")));
        assert!(cli.assume_yes);
        assert_eq!(
            cli.command,
            Commands::History {
                action: HistoryAction::Remove {
                    positions: vec![2, 5]
                }
            }
        );
    }

    #[test]
    fn test_history_remove_requires_positions() {
        assert!(Cli::try_parse_from(["tubesaver", "history", "remove"]).is_err());
    }

    #[test]
    fn test_play_local_and_cookies() {
        let cli = Cli::try_parse_from(["tubesaver", "play-local", "--all"]).unwrap();
        assert_eq!(cli.command, Commands::PlayLocal { all: true });

        let cli = Cli::try_parse_from(["tubesaver", "cookies", "export", "out.json"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Cookies {
                action: CookiesAction::Export {
                    path: PathBuf::from("out.json")
                }
            }
        );
    }
}
