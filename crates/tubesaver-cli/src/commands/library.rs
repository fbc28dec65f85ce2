//! History and playback commands.

use std::collections::HashSet;

use tracing::debug;
use tubesaver_core::{
    AudioLibrary, Command, Error, HistoryKey, HistoryRecord, HistoryStore, MpvRunner,
    PlaybackRunner, Result,
};

use super::download::print_report;
use super::state::AppState;
use crate::terminal::parse_indices;

/// One history line: position, timestamp, title and URL.
pub fn format_record(position: usize, record: &HistoryRecord) -> String {
    let when = record.timestamp.get(..19).unwrap_or(&record.timestamp);
    format!("{position:>3}. [{when}] {} - {}", record.title, record.url)
}

/// `tubesaver history list`.
pub fn history_list(state: &AppState) -> Result<bool> {
    let records = state.history.list();
    if records.is_empty() {
        println!("History is empty");
        return Ok(true);
    }
    for (i, record) in records.iter().enumerate() {
        println!("{}", format_record(i + 1, record));
    }
    Ok(true)
}

/// Keys of the records at 1-based `positions` in `store`.
pub fn keys_at(store: &HistoryStore, positions: &[usize]) -> Result<HashSet<HistoryKey>> {
    let records = store.list();
    positions
        .iter()
        .map(|&position| {
            position
                .checked_sub(1)
                .and_then(|i| records.get(i))
                .map(HistoryRecord::key)
                .ok_or_else(|| {
                    Error::Configuration(format!(
                        "No history entry {position} (have {})",
                        records.len()
                    ))
                })
        })
        .collect()
}

/// `tubesaver history remove <n>...`.
pub fn history_remove(state: &AppState, positions: &[usize]) -> Result<bool> {
    let keys = keys_at(&state.history, positions)?;
    let removed = state.history.remove(&keys)?;
    println!("Removed {removed} history entries");
    Ok(true)
}

/// `tubesaver history clear`.
pub fn history_clear(state: &AppState) -> Result<bool> {
    if !state.prompt().confirm("Clear the whole history?", false) {
        println!("History kept");
        return Ok(true);
    }
    state.history.clear()?;
    println!("History cleared");
    Ok(true)
}

/// `tubesaver play <url>`: record and stream through the player.
pub fn play_online(state: &AppState, url: &str) -> Result<bool> {
    let orchestrator = state.orchestrator(state.prompt());
    let report = orchestrator.dispatch(
        Command::PlayOnline {
            url: url.to_string(),
        },
        None,
    );
    Ok(print_report(&report))
}

/// `tubesaver play-local [--all]`: play one chosen file, or every file in
/// order, from the audio directory.
pub fn play_local(state: &AppState, all: bool) -> Result<bool> {
    let config = state.config_manager.snapshot();
    let library = AudioLibrary::new(&config.audio_path);
    let files = library.list();
    if files.is_empty() {
        println!("No audio files in {}", library.root().display());
        return Ok(false);
    }

    let player = MpvRunner::default();
    if !player.is_available() {
        return Err(Error::Playback("no media player found, install mpv".to_string()));
    }

    let selected = if all {
        files
    } else {
        let prompt = state.prompt();
        for (i, file) in files.iter().enumerate() {
            prompt.say(&format!("{:>4}. {}", i + 1, library.display_name(file)));
        }
        let answer = prompt.ask("Track to play (empty to cancel):");
        if answer.is_empty() {
            println!("Playback cancelled");
            return Ok(true);
        }
        let indices = parse_indices(&answer, files.len()).map_err(Error::Playback)?;
        indices
            .into_iter()
            .filter_map(|index| files.get(index - 1).cloned())
            .collect()
    };

    let mut all_ok = true;
    for file in &selected {
        println!("Playing: {}", library.display_name(file));
        let exit = player.play(&file.to_string_lossy())?;
        debug!("Player exit for {}: {:?}", file.display(), exit.code);
        all_ok &= exit.success();
    }
    Ok(all_ok)
}
