//! Progress reporting for batch commands
//!
//! Batch drivers talk to a [`ProgressReporter`]; whether that draws progress
//! bars, prints plain lines or nothing is decided once at startup.

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use indexmap::IndexSet;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Where one law is in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    Pending,
    Processing,
    Done,
    Failed(String),
}

/// Phase of the overall batch operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchPhase {
    LoadingConfig,
    DiscoveringLaws,
    Initializing,
    Updating,
    CheckingStatus,
    ApplyingCorrections,
    Resetting,
    Migrating,
    Completed,
    Failed(String),
}

impl BatchPhase {
    fn describe(&self) -> String {
        match self {
            Self::LoadingConfig => "📋 Loading configuration...".to_owned(),
            Self::DiscoveringLaws => "🔎 Discovering laws...".to_owned(),
            Self::Initializing => "🆕 Initializing correction files...".to_owned(),
            Self::Updating => "➕ Merging newly discovered tables...".to_owned(),
            Self::CheckingStatus => "📊 Checking review status...".to_owned(),
            Self::ApplyingCorrections => "🛠️  Applying corrections...".to_owned(),
            Self::Resetting => "🧹 Removing correction files...".to_owned(),
            Self::Migrating => "🔀 Migrating to per-version files...".to_owned(),
            Self::Completed => "✅ Completed!".to_owned(),
            Self::Failed(reason) => format!("❌ Failed: {reason}"),
        }
    }
}

/// Display backend for batch progress.
pub trait ProgressReporter: Send + Sync {
    fn set_phase(&self, phase: BatchPhase);

    /// Announce the laws of the next batch (call before processing starts).
    fn register_entries(&self, entries: Vec<String>);

    fn update_entry(&self, entry: &str, status: EntryStatus);

    fn log_info(&self, message: &str);

    fn log_warn(&self, message: &str);

    fn log_error(&self, message: &str);

    /// Print the summary and tear down the display.
    fn finish(&self);
}

/// Reporter for tests and library callers.
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn set_phase(&self, _phase: BatchPhase) {}
    fn register_entries(&self, _entries: Vec<String>) {}
    fn update_entry(&self, _entry: &str, _status: EntryStatus) {}
    fn log_info(&self, _message: &str) {}
    fn log_warn(&self, _message: &str) {}
    fn log_error(&self, _message: &str) {}
    fn finish(&self) {}
}

/// Per-law outcomes across every batch of one run.
#[derive(Debug)]
struct Tally {
    laws: usize,
    done: usize,
    failed: Vec<String>,
    started: Instant,
}

impl Default for Tally {
    fn default() -> Self {
        Self {
            laws: 0,
            done: 0,
            failed: Vec::new(),
            started: Instant::now(),
        }
    }
}

impl Tally {
    /// Count a finished law. Returns `false` for intermediate statuses.
    fn record(&mut self, entry: &str, status: &EntryStatus) -> bool {
        match status {
            EntryStatus::Done => self.done += 1,
            EntryStatus::Failed(_) => self.failed.push(entry.to_owned()),
            EntryStatus::Pending | EntryStatus::Processing => return false,
        }
        true
    }

    fn summary(&self) -> String {
        let mut out = format!(
            "📊 {} laws: {} done, {} failed in {:.2}s",
            self.laws,
            self.done,
            self.failed.len(),
            self.started.elapsed().as_secs_f64()
        );
        if !self.failed.is_empty() {
            out.push_str("\n   failed: ");
            out.push_str(&self.failed.join(", "));
        }
        out
    }
}

/// Plain lines on stderr, for pipes and CI logs.
#[derive(Default)]
pub struct SimpleReporter {
    tally: Mutex<Tally>,
}

impl SimpleReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressReporter for SimpleReporter {
    fn set_phase(&self, phase: BatchPhase) {
        eprintln!("{}", phase.describe());
    }

    fn register_entries(&self, entries: Vec<String>) {
        self.tally.lock().unwrap().laws += entries.len();
        eprintln!("   {} laws queued", entries.len());
    }

    fn update_entry(&self, entry: &str, status: EntryStatus) {
        if !self.tally.lock().unwrap().record(entry, &status) {
            return;
        }
        match status {
            EntryStatus::Failed(reason) => eprintln!("   ✗ {entry}: {reason}"),
            _ => eprintln!("   ✓ {entry}"),
        }
    }

    fn log_info(&self, message: &str) {
        eprintln!("ℹ️  {message}");
    }

    fn log_warn(&self, message: &str) {
        eprintln!("⚠️  {message}");
    }

    fn log_error(&self, message: &str) {
        eprintln!("❌ {message}");
    }

    fn finish(&self) {
        eprintln!("{}", self.tally.lock().unwrap().summary());
    }
}

/// One spinner for the phase and one bar for the laws, whose message lists
/// the laws currently in flight.
pub struct FancyReporter {
    multi: MultiProgress,
    phase: ProgressBar,
    laws: ProgressBar,
    active: Mutex<IndexSet<String>>,
    tally: Mutex<Tally>,
}

const ACTIVE_SHOWN: usize = 4;

impl FancyReporter {
    pub fn new() -> Self {
        let multi = MultiProgress::new();
        let phase = multi.add(ProgressBar::new_spinner());
        phase.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap(),
        );
        phase.enable_steady_tick(Duration::from_millis(100));
        let laws = multi.add(ProgressBar::new(0));
        laws.set_style(
            ProgressStyle::default_bar()
                .template("   {bar:40.cyan/blue} {pos}/{len} laws {wide_msg:.dim}")
                .unwrap()
                .progress_chars("█▓▒░  "),
        );
        Self {
            multi,
            phase,
            laws,
            active: Mutex::new(IndexSet::new()),
            tally: Mutex::new(Tally::default()),
        }
    }

    fn show_active(&self, active: &IndexSet<String>) {
        let mut shown = active.iter().take(ACTIVE_SHOWN).cloned().collect::<Vec<_>>();
        if active.len() > ACTIVE_SHOWN {
            shown.push(format!("+{}", active.len() - ACTIVE_SHOWN));
        }
        self.laws.set_message(shown.join(" "));
    }
}

impl Default for FancyReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for FancyReporter {
    fn set_phase(&self, phase: BatchPhase) {
        match phase {
            BatchPhase::Completed | BatchPhase::Failed(_) => {
                self.phase.finish_with_message(phase.describe())
            }
            _ => self.phase.set_message(phase.describe()),
        }
    }

    fn register_entries(&self, entries: Vec<String>) {
        self.tally.lock().unwrap().laws += entries.len();
        self.laws.set_position(0);
        self.laws.set_length(entries.len() as u64);
    }

    fn update_entry(&self, entry: &str, status: EntryStatus) {
        let mut active = self.active.lock().unwrap();
        if self.tally.lock().unwrap().record(entry, &status) {
            active.shift_remove(entry);
            self.laws.inc(1);
            if let EntryStatus::Failed(reason) = &status {
                self.multi.println(format!("   ✗ {entry}: {reason}")).ok();
            }
        } else if status == EntryStatus::Processing {
            active.insert(entry.to_owned());
        }
        self.show_active(&active);
    }

    fn log_info(&self, message: &str) {
        self.multi.println(format!("ℹ️  {message}")).ok();
    }

    fn log_warn(&self, message: &str) {
        self.multi.println(format!("⚠️  {message}")).ok();
    }

    fn log_error(&self, message: &str) {
        self.multi.println(format!("❌ {message}")).ok();
    }

    fn finish(&self) {
        self.laws.finish_and_clear();
        if !self.phase.is_finished() {
            self.phase.finish_and_clear();
        }
        eprintln!("{}", self.tally.lock().unwrap().summary());
    }
}

/// Bars on a terminal, plain lines otherwise.
pub fn create_reporter() -> Arc<dyn ProgressReporter> {
    if console::Term::stderr().is_term() {
        Arc::new(FancyReporter::new())
    } else {
        Arc::new(SimpleReporter::new())
    }
}
