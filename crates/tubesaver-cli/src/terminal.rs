//! Terminal interaction: yes/no and selection prompts over stdin, and
//! progress bars for running downloads.

use std::fmt;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tubesaver_core::{PlaylistChoice, PlaylistEntry, ProgressCallback, ProgressEvent, Prompt};

const BAR_TEMPLATE: &str = "{spinner:.green} {msg:30!} [{bar:30.cyan/blue}] {pos:>3}%";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg}";

/// Parse a 1-based selection such as `1,3,5-7` against a list of `len`
/// entries. Returns sorted, deduplicated indices.
pub fn parse_indices(input: &str, len: usize) -> Result<Vec<usize>, String> {
    let mut indices = Vec::new();
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (start, end) = match part.split_once('-') {
            Some((start, end)) => (parse_index(start)?, parse_index(end)?),
            None => {
                let index = parse_index(part)?;
                (index, index)
            }
        };
        if start == 0 || start > end || end > len {
            return Err(format!("'{part}' is outside 1-{len}"));
        }
        indices.extend(start..=end);
    }
    if indices.is_empty() {
        return Err("no items selected".to_string());
    }
    indices.sort_unstable();
    indices.dedup();
    Ok(indices)
}

fn parse_index(text: &str) -> Result<usize, String> {
    text.trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number", text.trim()))
}

/// [`Prompt`] reading answers line by line.
pub struct TerminalPrompt {
    input: Mutex<Box<dyn BufRead + Send>>,
    output: Mutex<Box<dyn Write + Send>>,
    assume_yes: bool,
}

impl fmt::Debug for TerminalPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminalPrompt")
            .field("assume_yes", &self.assume_yes)
            .finish_non_exhaustive()
    }
}

impl TerminalPrompt {
    /// Prompt on stdin/stderr.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(
            Box::new(io::BufReader::new(io::stdin())),
            Box::new(io::stderr()),
        )
    }

    /// Prompt over arbitrary streams.
    #[must_use]
    pub fn new(input: Box<dyn BufRead + Send>, output: Box<dyn Write + Send>) -> Self {
        Self {
            input: Mutex::new(input),
            output: Mutex::new(output),
            assume_yes: false,
        }
    }

    /// Answer every question with its affirmative default without reading.
    #[must_use]
    pub fn with_assume_yes(mut self, assume_yes: bool) -> Self {
        self.assume_yes = assume_yes;
        self
    }

    /// Print `question` and read one trimmed line. End of input reads as
    /// an empty answer.
    pub fn ask(&self, question: &str) -> String {
        if let Ok(mut output) = self.output.lock() {
            let _ = write!(output, "{question} ");
            let _ = output.flush();
        }
        let mut line = String::new();
        if let Ok(mut input) = self.input.lock()
            && input.read_line(&mut line).is_err()
        {
            line.clear();
        }
        line.trim().to_string()
    }

    /// Yes/no question; an empty answer takes `default`.
    pub fn confirm(&self, question: &str, default: bool) -> bool {
        if self.assume_yes {
            return true;
        }
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        let answer = self.ask(&format!("{question} {hint}")).to_lowercase();
        match answer.as_str() {
            "" => default,
            "y" | "yes" => true,
            _ => false,
        }
    }

    /// Print a line to the prompt's output.
    pub fn say(&self, line: &str) {
        if let Ok(mut output) = self.output.lock() {
            let _ = writeln!(output, "{line}");
        }
    }

    /// List `entries` and ask for a selection until it parses or the answer
    /// is empty. `None` means the user gave up.
    pub fn select_entries(&self, entries: &[PlaylistEntry]) -> Option<Vec<usize>> {
        for entry in entries {
            self.say(&format!("{:>4}. {}", entry.index, entry.title));
        }
        loop {
            let answer = self.ask("Items to download (e.g. 1,3,5-7; empty to cancel):");
            if answer.is_empty() {
                return None;
            }
            match parse_indices(&answer, entries.len()) {
                Ok(indices) => return Some(indices),
                Err(reason) => self.say(&format!("Invalid selection: {reason}")),
            }
        }
    }
}

impl Prompt for TerminalPrompt {
    fn confirm_overwrite(&self, existing: &Path) -> bool {
        if self.assume_yes {
            return true;
        }
        self.confirm(
            &format!("{} already exists. Overwrite?", existing.display()),
            false,
        )
    }

    fn playlist_selection(&self, url: &str, entries: &[PlaylistEntry]) -> PlaylistChoice {
        if self.assume_yes {
            return PlaylistChoice::All;
        }
        self.say(&format!("{url} is a playlist with {} items.", entries.len()));
        if self.confirm("Download the whole playlist?", true) {
            return PlaylistChoice::All;
        }
        match self.select_entries(entries) {
            Some(indices) => PlaylistChoice::Items(tubesaver_core::selector_from_indices(&indices)),
            None => PlaylistChoice::Cancel,
        }
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template(SPINNER_TEMPLATE).unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// One progress bar driven by [`ProgressEvent`]s.
///
/// The bar is created on the first event so prompts shown before the fetch
/// starts are not overdrawn.
#[derive(Debug)]
pub struct DownloadProgress {
    label: String,
    multi: Option<MultiProgress>,
    bar: OnceLock<ProgressBar>,
}

impl DownloadProgress {
    /// A standalone bar labelled `label`.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            multi: None,
            bar: OnceLock::new(),
        }
    }

    /// A bar drawn as one line of `multi`.
    pub fn in_group(label: impl Into<String>, multi: &MultiProgress) -> Self {
        Self {
            label: label.into(),
            multi: Some(multi.clone()),
            bar: OnceLock::new(),
        }
    }

    fn bar(&self) -> &ProgressBar {
        self.bar.get_or_init(|| {
            let bar = ProgressBar::new(100).with_style(bar_style());
            let bar = match &self.multi {
                Some(multi) => multi.add(bar),
                None => bar,
            };
            bar.set_message(self.label.clone());
            bar
        })
    }

    /// Advance the bar.
    pub fn handle(&self, event: ProgressEvent) {
        let bar = self.bar();
        match event {
            ProgressEvent::Downloading { percent } => {
                bar.set_position(percent.clamp(0.0, 100.0) as u64);
            }
            ProgressEvent::Processing => {
                bar.set_style(spinner_style());
                bar.set_message(format!("{} (processing)", self.label));
                bar.enable_steady_tick(Duration::from_millis(120));
            }
            ProgressEvent::Finished => {
                bar.set_style(bar_style());
                bar.set_message(self.label.clone());
                bar.set_position(100);
            }
        }
    }

    /// Boxed callback feeding this bar, for handing to the orchestrator.
    pub fn callback(self: &Arc<Self>) -> ProgressCallback {
        let progress = Arc::clone(self);
        Box::new(move |event| progress.handle(event))
    }

    /// Remove the bar, if one was drawn.
    pub fn finish(&self) {
        if let Some(bar) = self.bar.get() {
            bar.finish_and_clear();
        }
    }
}
