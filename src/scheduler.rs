//! Debounced, de-duplicated triggering of domain analysis.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::transcript::Transcript;
use crate::types::analysis::AnalysisRequest;

/// Whether an analysis should run now.
///
/// True once the transcript has been quiet for `quiet_period` and its trimmed
/// text is non-empty and differs from what was analyzed last.
pub fn should_fire(
    last_change: Option<Instant>,
    now: Instant,
    quiet_period: Duration,
    text: &str,
    last_analyzed: Option<&str>,
) -> bool {
    let quiet = match last_change {
        Some(changed) => now.saturating_duration_since(changed) >= quiet_period,
        None => true,
    };
    let text = text.trim();
    quiet && !text.is_empty() && last_analyzed != Some(text)
}

/// Holds the one pending timer and the text of the last analysis.
///
/// Every [`AnalysisScheduler::arm`] replaces the pending timer. A firing
/// timer only reports its generation; the owner then calls
/// [`AnalysisScheduler::take_due`] with the current transcript, so the
/// analysis always sees the text as of firing time.
#[derive(Debug)]
pub struct AnalysisScheduler {
    quiet_period: Duration,
    recent_window: usize,
    generation: u64,
    last_change: Option<Instant>,
    last_analyzed: Option<String>,
    timer: Option<JoinHandle<()>>,
}

impl AnalysisScheduler {
    pub fn new(quiet_period: Duration, recent_window: usize) -> Self {
        Self {
            quiet_period,
            recent_window,
            generation: 0,
            last_change: None,
            last_analyzed: None,
            timer: None,
        }
    }

    /// Restarts the quiet period. `on_due` runs when it elapses uninterrupted.
    pub fn arm<F>(&mut self, on_due: F)
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.abort_timer();
        self.generation += 1;
        self.last_change = Some(Instant::now());

        let generation = self.generation;
        let quiet_period = self.quiet_period;
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet_period).await;
            on_due(generation);
        }));
    }

    /// The request to send for a fired timer, if one is due.
    ///
    /// Stale generations yield nothing. A returned request is recorded as
    /// analyzed right away, so a failed call is not retried.
    pub fn take_due(&mut self, generation: u64, transcript: &Transcript) -> Option<AnalysisRequest> {
        if generation != self.generation {
            tracing::trace!("ignoring stale analysis timer {}", generation);
            return None;
        }
        self.timer = None;

        let snapshot = transcript.snapshot();
        if !should_fire(
            self.last_change,
            Instant::now(),
            self.quiet_period,
            &snapshot,
            self.last_analyzed.as_deref(),
        ) {
            tracing::debug!("transcript unchanged since last analysis, skipping");
            return None;
        }

        let text = snapshot.trim().to_string();
        self.last_analyzed = Some(text.clone());
        Some(AnalysisRequest::new(
            text,
            transcript.recent_window(self.recent_window),
        ))
    }

    pub fn is_pending(&self) -> bool {
        self.timer.as_ref().is_some_and(|timer| !timer.is_finished())
    }

    /// Drops the pending timer. A callback already queued becomes stale.
    pub fn cancel(&mut self) {
        self.abort_timer();
        self.generation += 1;
    }

    /// Cancels and forgets the last analyzed text, for a new session.
    pub fn reset(&mut self) {
        self.cancel();
        self.last_change = None;
        self.last_analyzed = None;
    }

    fn abort_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for AnalysisScheduler {
    fn drop(&mut self) {
        self.abort_timer();
    }
}
