//! Shared state for one CLI invocation.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;
use tubesaver_core::{
    AppPaths, ConfigManager, CookieStore, DownloadOrchestrator, HistoryStore,
    HttpCookieValidator, Prompt, SoundNotifier, YtDlpExtractor,
};

use crate::terminal::TerminalPrompt;

/// Stores and settings under the base directory.
#[derive(Debug)]
pub struct AppState {
    /// Files under the base directory.
    pub(crate) paths: AppPaths,
    /// Persisted configuration.
    pub(crate) config_manager: ConfigManager,
    /// Download and playback history.
    pub(crate) history: Arc<HistoryStore>,
    /// Cookie store and its Netscape export.
    pub(crate) cookies: Arc<CookieStore>,
    /// Answer prompts affirmatively without asking.
    pub(crate) assume_yes: bool,
}

impl AppState {
    /// Open every store under `root`. Missing files are created lazily.
    pub fn new(root: PathBuf, assume_yes: bool) -> Self {
        let paths = AppPaths::new(root);
        debug!("Base directory: {}", paths.root().display());

        let config_manager = ConfigManager::load(paths.config_file());
        let history = Arc::new(HistoryStore::open(paths.history_file()));
        let cookies = Arc::new(CookieStore::open(
            paths.cookies_file(),
            paths.cookies_export_file(),
        ));

        Self {
            paths,
            config_manager,
            history,
            cookies,
            assume_yes,
        }
    }

    /// Prompt on the terminal, honouring `--yes`.
    pub fn prompt(&self) -> Arc<TerminalPrompt> {
        Arc::new(TerminalPrompt::stdio().with_assume_yes(self.assume_yes))
    }

    /// Orchestrator over the current configuration snapshot, driving
    /// `yt-dlp` with the exported cookies and proxy.
    pub fn orchestrator(&self, prompt: Arc<dyn Prompt>) -> DownloadOrchestrator {
        let config = self.config_manager.snapshot();
        let cookie_file = self.cookies.extractor_cookie_file();
        let extractor = YtDlpExtractor::new()
            .with_proxy(config.proxy().map(str::to_string))
            .with_cookie_file(cookie_file.clone());

        DownloadOrchestrator::new(
            Arc::clone(&config),
            Arc::new(extractor),
            Arc::clone(&self.history),
        )
        .with_prompt(prompt)
        .with_notifier(Arc::new(SoundNotifier::from_config(&config)))
        .with_cookie_file(cookie_file)
        .with_cookie_check(
            Arc::clone(&self.cookies),
            Arc::new(HttpCookieValidator::new()),
        )
    }
}
