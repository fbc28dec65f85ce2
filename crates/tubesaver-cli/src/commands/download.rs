//! Download commands: single URLs, interactive playlist selection and
//! batch files through the worker pool.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use indicatif::MultiProgress;
use tracing::{info, warn};
use tubesaver_core::{
    Command, CommandReport, DownloadQueue, DownloadRequest, MediaKind, NonInteractive, Prompt,
    QueueEvent, QueueItem, QueueItemId, QueueItemStatus, Result, selector_from_indices,
};

use super::state::AppState;
use crate::terminal::DownloadProgress;

/// Build the orchestrator command for `kind`.
pub fn download_command(url: &str, kind: MediaKind, items: Option<String>) -> Command {
    let url = url.to_string();
    match kind {
        MediaKind::Audio => Command::DownloadAudio {
            url,
            playlist_items: items,
        },
        MediaKind::Video => Command::DownloadVideo {
            url,
            playlist_items: items,
        },
    }
}

/// Print warnings and the status line. Returns whether the exit status
/// should be success; a user cancellation is not a failure.
pub fn print_report(report: &CommandReport) -> bool {
    let (warnings, cancelled) = match report {
        CommandReport::Download(report) => (&report.warnings, report.is_cancelled()),
        CommandReport::Playback(report) => (&report.warnings, false),
    };
    for warning in warnings {
        eprintln!("Warning: {warning}");
    }
    println!("{}", report.message());
    report.is_success() || cancelled
}

/// `tubesaver audio|video <url> [--items SEL]`.
pub fn download(state: &AppState, url: &str, kind: MediaKind, items: Option<String>) -> Result<bool> {
    let orchestrator = state.orchestrator(state.prompt());
    let progress = Arc::new(DownloadProgress::new(url));
    let report =
        orchestrator.dispatch(download_command(url, kind, items), Some(progress.callback()));
    progress.finish();
    Ok(print_report(&report))
}

/// `tubesaver playlist <url> [--video]`: list the entries, ask which to
/// fetch, then download them as one selector.
pub fn playlist(state: &AppState, url: &str, kind: MediaKind) -> Result<bool> {
    let prompt = state.prompt();
    let orchestrator = state.orchestrator(Arc::clone(&prompt) as Arc<dyn Prompt>);

    let entries = orchestrator.list_playlist(url)?;
    if entries.is_empty() {
        println!("No playlist entries found at {url}");
        return Ok(false);
    }

    let selector = if state.assume_yes {
        None
    } else {
        match prompt.select_entries(&entries) {
            Some(indices) => Some(selector_from_indices(&indices)),
            None => {
                println!("Download cancelled");
                return Ok(true);
            }
        }
    };
    info!(
        "Downloading {} from playlist {}",
        selector.as_deref().unwrap_or("all items"),
        url
    );

    let progress = Arc::new(DownloadProgress::new(url));
    let report =
        orchestrator.dispatch(download_command(url, kind, selector), Some(progress.callback()));
    progress.finish();
    Ok(print_report(&report))
}

/// URLs of a batch file: one per line, blank lines and `#` comments skipped.
pub fn parse_batch(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// `tubesaver batch <file> [--video]`.
///
/// Overwrite questions cannot be answered while several downloads share the
/// terminal, so existing files are kept unless `--yes` was given.
pub fn batch(state: &AppState, file: &Path, kind: MediaKind) -> Result<bool> {
    let urls = parse_batch(&std::fs::read_to_string(file)?);
    if urls.is_empty() {
        println!("No URLs in {}", file.display());
        return Ok(false);
    }

    let prompt: Arc<dyn Prompt> = if state.assume_yes {
        state.prompt()
    } else {
        Arc::new(NonInteractive)
    };
    let orchestrator = Arc::new(state.orchestrator(prompt));
    let requests = urls
        .iter()
        .map(|url| DownloadRequest::new(url.as_str(), kind))
        .collect();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let items = runtime.block_on(run_batch(orchestrator, requests));

    let failed = items
        .iter()
        .filter(|item| matches!(item.status, QueueItemStatus::Failed(_)))
        .count();
    let completed = items
        .iter()
        .filter(|item| item.status == QueueItemStatus::Completed)
        .count();
    println!(
        "Batch finished: {completed} downloaded, {failed} failed, {} skipped",
        items.len() - completed - failed
    );
    Ok(failed == 0)
}

async fn run_batch(
    orchestrator: Arc<tubesaver_core::DownloadOrchestrator>,
    requests: Vec<DownloadRequest>,
) -> Vec<QueueItem> {
    let queue = DownloadQueue::new(orchestrator);
    let multi = MultiProgress::new();
    let ids = queue.submit_batch(requests).await;

    let mut labels: HashMap<QueueItemId, String> = HashMap::new();
    let mut bars: HashMap<QueueItemId, DownloadProgress> = HashMap::new();
    let mut remaining = ids.len();

    while remaining > 0 {
        let Some(event) = queue.recv_event().await else {
            warn!(context = "Batch", "Queue closed with {} items outstanding", remaining);
            break;
        };
        match event {
            QueueEvent::Queued { item_id, url } => {
                labels.insert(item_id, url);
            }
            QueueEvent::Started { .. } => {}
            QueueEvent::Progress { item_id, event } => {
                let label = labels.get(&item_id).cloned().unwrap_or_default();
                bars.entry(item_id)
                    .or_insert_with(|| DownloadProgress::in_group(label, &multi))
                    .handle(event);
            }
            QueueEvent::Finished {
                item_id, message, ..
            } => {
                if let Some(bar) = bars.remove(&item_id) {
                    bar.finish();
                }
                let _ = multi.println(message);
                remaining -= 1;
            }
        }
    }

    queue.wait().await
}
