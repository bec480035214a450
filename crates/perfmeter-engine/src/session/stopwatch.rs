use std::time::{Duration, Instant};

/// Pausable elapsed-time counter.
#[derive(Debug, Default)]
pub(crate) struct Stopwatch {
    elapsed: Duration,
    running_since: Option<Instant>,
}

impl Stopwatch {
    pub(crate) fn start(&mut self) {
        if self.running_since.is_none() {
            self.running_since = Some(Instant::now());
        }
    }

    /// Stop accumulating. Returns whether it was running.
    pub(crate) fn stop(&mut self) -> bool {
        match self.running_since.take() {
            Some(since) => {
                self.elapsed += since.elapsed();
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    pub(crate) fn elapsed(&self) -> Duration {
        match self.running_since {
            Some(since) => self.elapsed + since.elapsed(),
            None => self.elapsed,
        }
    }
}
