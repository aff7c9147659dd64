use indicatif::{ProgressBar, ProgressStyle};
use std::cell::RefCell;
use std::time::Duration;

use crate::utils::constants::PHASE_IDLE;

/// Receives human-readable phase names as a pipeline moves between stages.
///
/// An empty phase means the pipeline is idle.
pub trait ProgressSink {
    fn update_phase(&self, phase: &str);
}

/// Terminal spinner showing the current phase
pub struct ProgressReporter {
    progress_bar: Option<ProgressBar>,
    silent: bool,
}

impl ProgressReporter {
    pub fn new_spinner(message: &str, silent: bool) -> Self {
        if silent {
            Self {
                progress_bar: None,
                silent: true,
            }
        } else {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
                pb.set_style(style);
            }
            pb.set_message(message.to_string());
            pb.enable_steady_tick(Duration::from_millis(100));

            Self {
                progress_bar: Some(pb),
                silent: false,
            }
        }
    }

    pub fn set_message(&self, message: &str) {
        if let Some(ref pb) = self.progress_bar {
            pb.set_message(message.to_string());
        }
    }

    pub fn finish_with_message(&self, message: &str) {
        if let Some(ref pb) = self.progress_bar {
            pb.finish_with_message(message.to_string());
        }
    }

    pub fn println(&self, message: &str) {
        if !self.silent {
            if let Some(ref pb) = self.progress_bar {
                pb.println(message);
            } else {
                println!("{}", message);
            }
        }
    }
}

impl ProgressSink for ProgressReporter {
    fn update_phase(&self, phase: &str) {
        tracing::debug!(phase, "phase changed");
        if phase.is_empty() {
            self.set_message("Idle");
        } else {
            self.set_message(phase);
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if let Some(ref pb) = self.progress_bar {
            pb.finish();
        }
    }
}

/// Records every phase it receives, in order
#[derive(Debug, Default)]
pub struct PhaseLog {
    phases: RefCell<Vec<String>>,
}

impl PhaseLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phases(&self) -> Vec<String> {
        self.phases.borrow().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.phases.borrow().last().cloned()
    }
}

impl ProgressSink for PhaseLog {
    fn update_phase(&self, phase: &str) {
        self.phases.borrow_mut().push(phase.to_string());
    }
}

/// Discards all phase updates
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn update_phase(&self, _phase: &str) {}
}

/// Reports the idle phase when dropped, whichever way a run ends
pub struct PhaseGuard<'a> {
    sink: &'a dyn ProgressSink,
}

impl<'a> PhaseGuard<'a> {
    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        Self { sink }
    }

    pub fn enter(&self, phase: &str) {
        self.sink.update_phase(phase);
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.sink.update_phase(PHASE_IDLE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_log_records_in_order() {
        let log = PhaseLog::new();
        log.update_phase("Evaluating");
        log.update_phase("Plotting");

        assert_eq!(log.phases(), vec!["Evaluating", "Plotting"]);
        assert_eq!(log.last().as_deref(), Some("Plotting"));
    }

    #[test]
    fn test_phase_guard_resets_to_idle() {
        let log = PhaseLog::new();
        {
            let guard = PhaseGuard::new(&log);
            guard.enter("Plotting");
        }

        assert_eq!(log.phases(), vec!["Plotting", ""]);
    }

    #[test]
    fn test_silent_reporter_accepts_phases() {
        let reporter = ProgressReporter::new_spinner("Starting", true);
        reporter.update_phase("Evaluating");
        reporter.update_phase("");
        reporter.finish_with_message("done");
    }
}
