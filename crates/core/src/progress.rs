//! Progress reporting capability
//!
//! Long-running operations (opening, clustering, file loading) report their
//! advance through a [`ProgressAdapter`]. Implementations live with the host
//! (a CLI progress bar, a GUI widget); engine code only ever talks to the
//! trait. Reporting is observational: there is no cancellation channel.

/// Observer for long-running operations.
pub trait ProgressAdapter {
    /// Declare how many steps the coming phase will take.
    fn set_range(&mut self, steps: usize);

    /// Report the current step together with a short status message.
    fn update(&mut self, step: usize, message: &str);
}

/// No-op adapter for hosts that do not track progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressAdapter for NullProgress {
    fn set_range(&mut self, _steps: usize) {}

    fn update(&mut self, _step: usize, _message: &str) {}
}

/// Adapter that records every call, for tests and debugging.
#[derive(Debug, Clone, Default)]
pub struct RecordingProgress {
    /// Ranges declared via `set_range`, in call order
    pub ranges: Vec<usize>,
    /// `(step, message)` pairs in call order
    pub updates: Vec<(usize, String)>,
}

impl ProgressAdapter for RecordingProgress {
    fn set_range(&mut self, steps: usize) {
        self.ranges.push(steps);
    }

    fn update(&mut self, step: usize, message: &str) {
        self.updates.push((step, message.to_string()));
    }
}
