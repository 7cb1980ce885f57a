use tracing::{debug, info};

/// Stages reported while aligning a pair.
#[derive(Clone, Debug, PartialEq)]
pub enum AlignProgress {
    Upsampling { factor: usize },
    Offsets {
        iteration: usize,
        clip_duration_secs: usize,
        offset_secs: usize,
        delay_front: i64,
        delay_back: i64,
    },
    Widening { clip_duration_secs: usize, offset_secs: usize },
    Correcting { delta: i64 },
    Downsampling { factor: usize },
}

/// Receives progress events. Implemented for any `Fn(&AlignProgress)`.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, event: &AlignProgress);
}

impl<F> ProgressObserver for F
where
    F: Fn(&AlignProgress) + Send + Sync,
{
    fn on_progress(&self, event: &AlignProgress) {
        self(event)
    }
}

/// Forwards events to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn on_progress(&self, event: &AlignProgress) {
        match event {
            AlignProgress::Offsets {
                iteration,
                delay_front,
                delay_back,
                ..
            } => debug!(iteration, delay_front, delay_back, "offsets"),
            AlignProgress::Widening {
                clip_duration_secs,
                offset_secs,
            } => info!(clip_duration_secs, offset_secs, "drift too large, widening windows"),
            other => debug!(?other, "align"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_progress(&self, _event: &AlignProgress) {}
}
