use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

use roi_congestion::pipeline::{Progress, ProgressReporter, RunSummary};
use roi_congestion::PipelineError;

#[derive(Clone, Copy, Debug)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool, disable_pretty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty, disable_pretty)
    }

    fn use_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.use_pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// Progress reporter for a pipeline run: a bar on TTYs, periodic lines otherwise.
    pub fn run_progress(&self) -> RunProgress {
        let bar = self.use_pretty().then(|| {
            let bar = ProgressBar::new(PERMILLE);
            bar.set_draw_target(ProgressDrawTarget::stderr());
            let style = ProgressStyle::with_template(
                "{spinner} [{elapsed_precise}] [{bar:40}] {percent:>3}% {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar());
            bar.set_style(style);
            bar
        });
        RunProgress {
            bar,
            last_printed: None,
            start: Instant::now(),
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

const PERMILLE: u64 = 1000;
const PLAIN_STEP_PERCENT: u64 = 10;

pub struct RunProgress {
    bar: Option<ProgressBar>,
    last_printed: Option<u64>,
    start: Instant,
}

impl ProgressReporter for RunProgress {
    fn update(&mut self, progress: Progress) {
        let message = match progress.total_frames {
            Some(total) => format!("frame {}/{}", progress.frames_read, total),
            None => format!("frame {}", progress.frames_read),
        };
        if let Some(bar) = &self.bar {
            bar.set_position((progress.fraction * PERMILLE as f64) as u64);
            bar.set_message(message);
            return;
        }
        let percent = (progress.fraction * 100.0) as u64;
        let step = percent / PLAIN_STEP_PERCENT;
        if self.last_printed.map_or(true, |last| step > last) {
            eprintln!("   {:>3}% {}", percent, message);
            self.last_printed = Some(step);
        }
    }

    fn finish(&mut self, result: Result<&RunSummary, &PipelineError>) {
        let elapsed = format_duration(self.start.elapsed());
        let message = match result {
            Ok(summary) => format!(
                "✔ analysed {} frame(s) ({})",
                summary.frames_processed, elapsed
            ),
            Err(e) => format!("✘ {} ({})", e.code(), elapsed),
        };
        match &self.bar {
            Some(bar) => {
                bar.set_position(PERMILLE);
                bar.finish_with_message(message);
            }
            None => eprintln!("{message}"),
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
