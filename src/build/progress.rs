//! Build progress reporting.
//!
//! Job visibility is presentation-only: every job moves through
//! pending, running, done, and reporters render those transitions
//! without ever influencing scheduling.
//!
//! # Example
//!
//! ```ignore
//! use bakery::build::progress::{ConsoleProgress, ProgressEvent, ProgressReporter};
//!
//! let reporter = ConsoleProgress::new();
//! reporter.report(ProgressEvent::BuildStarted { total_jobs: 3 });
//! reporter.report(ProgressEvent::JobStarted { label: "copyfile: a.txt".to_string() });
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Terminal status of a finished job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Conversion succeeded
    Success,
    /// Conversion failed
    Failed(String),
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Success => write!(f, "success"),
            JobStatus::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// Events that can be reported during a build.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Build process started; all jobs are pending
    BuildStarted {
        /// Total number of jobs to run
        total_jobs: usize,
    },
    /// A job moved from pending to running
    JobStarted {
        /// Descriptive job label (converter name plus relative paths)
        label: String,
    },
    /// A job finished
    JobCompleted {
        /// Descriptive job label
        label: String,
        /// How the job ended
        status: JobStatus,
        /// Duration in milliseconds
        duration_ms: u64,
    },
    /// Build process completed
    BuildCompleted {
        /// Whether the whole build succeeded
        success: bool,
        /// Number of files converted
        converted: usize,
        /// Number of files skipped as up to date
        up_to_date: usize,
        /// Total duration in milliseconds
        duration_ms: u64,
    },
    /// Informational diagnostic (shown in verbose mode)
    Notice {
        /// Message text
        message: String,
    },
    /// A non-fatal warning
    Warning {
        /// Message text
        message: String,
    },
    /// A fatal error, emitted after the display is torn down
    Error {
        /// Message text
        message: String,
    },
}

/// Trait for progress reporters.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event.
    fn report(&self, event: ProgressEvent);

    /// Check if this reporter wants verbose output.
    fn is_verbose(&self) -> bool {
        false
    }
}

/// A progress reporter that discards all events.
#[derive(Debug, Default)]
pub struct NullProgress;

impl NullProgress {
    /// Create a new null progress reporter.
    pub fn new() -> Self {
        Self
    }
}

impl ProgressReporter for NullProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Console progress reporter with optional colors.
pub struct ConsoleProgress {
    /// Whether to use colors
    use_colors: bool,
    /// Whether to show verbose output
    verbose: bool,
    /// Whether to announce jobs when they start, not only when they finish
    show_all_jobs: bool,
    /// Completed job count
    current: AtomicUsize,
    /// Total job count
    total: AtomicUsize,
    /// Output writer (injectable for testing)
    output: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for ConsoleProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleProgress")
            .field("use_colors", &self.use_colors)
            .field("verbose", &self.verbose)
            .field("show_all_jobs", &self.show_all_jobs)
            .field("current", &self.current)
            .field("total", &self.total)
            .finish()
    }
}

impl ConsoleProgress {
    /// Create a console progress reporter writing to stderr.
    pub fn new() -> Self {
        Self {
            use_colors: atty::is(atty::Stream::Stderr),
            verbose: false,
            show_all_jobs: false,
            current: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            output: Mutex::new(Box::new(std::io::stderr())),
        }
    }

    /// Create a console progress reporter that writes to a custom output.
    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self {
            use_colors: false, // Disable colors for custom output
            verbose: false,
            show_all_jobs: false,
            current: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            output: Mutex::new(Box::new(output)),
        }
    }

    /// Set whether to use colors.
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    /// Set verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set whether running jobs are announced as they start.
    pub fn with_show_all_jobs(mut self, show_all_jobs: bool) -> Self {
        self.show_all_jobs = show_all_jobs;
        self
    }

    fn color(&self, text: &str, color: &str) -> String {
        if self.use_colors {
            format!("{}{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    fn green(&self, text: &str) -> String {
        self.color(text, "\x1b[32m")
    }

    fn red(&self, text: &str) -> String {
        self.color(text, "\x1b[31m")
    }

    fn yellow(&self, text: &str) -> String {
        self.color(text, "\x1b[33m")
    }

    fn cyan(&self, text: &str) -> String {
        self.color(text, "\x1b[36m")
    }

    fn writeln(&self, line: &str) {
        if let Ok(mut output) = self.output.lock() {
            let _ = writeln!(output, "{}", line);
        }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for ConsoleProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::BuildStarted { total_jobs } => {
                self.total.store(total_jobs, Ordering::SeqCst);
                self.current.store(0, Ordering::SeqCst);
                if total_jobs > 0 {
                    self.writeln(&format!(
                        "{} Running {} job{}...",
                        self.cyan("[build]"),
                        total_jobs,
                        if total_jobs == 1 { "" } else { "s" }
                    ));
                }
            }
            ProgressEvent::JobStarted { label } => {
                if self.verbose || self.show_all_jobs {
                    self.writeln(&format!("{} {} ...", self.cyan("[build]"), label));
                }
            }
            ProgressEvent::JobCompleted { label, status, duration_ms } => {
                let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
                let total = self.total.load(Ordering::SeqCst);

                let status_str = match &status {
                    JobStatus::Success => self.green("ok"),
                    JobStatus::Failed(_) => self.red("FAILED"),
                };

                self.writeln(&format!(
                    "{} [{}/{}] {} {} ({})",
                    self.cyan("[build]"),
                    current,
                    total,
                    status_str,
                    label,
                    format_duration(duration_ms)
                ));

                if let JobStatus::Failed(err) = status {
                    self.writeln(&format!("        {}", self.red(&err)));
                }
            }
            ProgressEvent::BuildCompleted { success, converted, up_to_date, duration_ms } => {
                if success {
                    self.writeln(&format!(
                        "\n{} {} converted, {} up to date in {}",
                        self.green("[done]"),
                        converted,
                        up_to_date,
                        format_duration(duration_ms)
                    ));
                } else {
                    self.writeln(&format!(
                        "\n{} Build failed after {}",
                        self.red("[error]"),
                        format_duration(duration_ms)
                    ));
                }
            }
            ProgressEvent::Notice { message } => {
                if self.verbose {
                    self.writeln(&format!("{} {}", self.cyan("[build]"), message));
                }
            }
            ProgressEvent::Warning { message } => {
                self.writeln(&format!("{} {}", self.yellow("[warn]"), message));
            }
            ProgressEvent::Error { message } => {
                self.writeln(&format!("{} {}", self.red("[error]"), message));
            }
        }
    }

    fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Format a millisecond duration for display.
fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else {
        format!("{:.2}s", ms as f64 / 1000.0)
    }
}
