//! Wiring from packet capture to the display.
//!
//! [`Monitor::run`] owns three activities:
//!
//! - the capture loop, on a blocking thread;
//! - a single reassembly task feeding decoded messages into the pipeline and
//!   sweeping idle flows;
//! - the [`OrderedPipeline`] drain.
//!
//! Shutdown runs in that order: capture stops, reassembly drains the segment
//! channel, then the pipeline displays what it can within its grace period.

use std::{sync::Arc, time::Duration};

use tokio::{sync::mpsc, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    capture::{CaptureFilter, CaptureStats, PacketSource, Segment, run_capture},
    display::DisplaySink,
    error::Result,
    flow::{FlowBufferStore, FlowConfig},
    frame::FrameDecoder,
    pipeline::{OrderedPipeline, PipelineConfig, PipelineHandle, ShutdownOutcome},
    translate::TranslationRouter,
};

/// Default interval between idle-flow sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Default capacity of the capture to reassembly channel.
pub const DEFAULT_SEGMENT_CAPACITY: usize = 1024;

/// Settings for [`Monitor`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonitorConfig {
    pub filter: CaptureFilter,
    pub flow: FlowConfig,
    pub pipeline: PipelineConfig,
    pub sweep_interval: Duration,
    pub segment_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            filter: CaptureFilter::default(),
            flow: FlowConfig::default(),
            pipeline: PipelineConfig::default(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            segment_capacity: DEFAULT_SEGMENT_CAPACITY,
        }
    }
}

/// Summary returned once the monitor stops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MonitorReport {
    pub capture: CaptureStats,
    /// Messages handed to the pipeline.
    pub submitted: u64,
    pub pipeline: ShutdownOutcome,
}

/// Capture, reassembly and ordered display for one packet source.
#[derive(Debug)]
pub struct Monitor {
    decoder: FrameDecoder,
    config: MonitorConfig,
}

impl Monitor {
    #[must_use]
    pub fn new(decoder: FrameDecoder, config: MonitorConfig) -> Self { Self { decoder, config } }

    /// Run until `shutdown` is cancelled or the source is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Capture`](crate::Error::Capture) if the source fails,
    /// or [`Error::Task`](crate::Error::Task) if the capture thread panics.
    /// The pipeline is drained in either case.
    pub async fn run<S>(
        self,
        mut source: S,
        router: Arc<TranslationRouter>,
        sink: Arc<dyn DisplaySink>,
        shutdown: CancellationToken,
    ) -> Result<MonitorReport>
    where
        S: PacketSource + 'static,
    {
        let Self { decoder, config } = self;
        let pipeline = OrderedPipeline::spawn(router, sink, config.pipeline);
        let store = FlowBufferStore::new(config.flow);
        let (tx, rx) = mpsc::channel(config.segment_capacity.max(1));

        let filter = config.filter.clone();
        let capture_token = shutdown.child_token();
        let capture = tokio::task::spawn_blocking(move || {
            run_capture(&mut source, &filter, &tx, &capture_token)
        });
        let handle = pipeline.handle();
        let reassembly = reassemble(rx, &store, &decoder, &handle, config.sweep_interval);

        let (capture, submitted) = tokio::join!(capture, reassembly);
        let outcome = pipeline.shutdown().await;
        info!(submitted, flows = store.len(), ?outcome, "monitor stopped");

        let capture = capture??;
        Ok(MonitorReport {
            capture,
            submitted,
            pipeline: outcome,
        })
    }
}

/// Feed segments through the flow store until the capture side closes.
async fn reassemble(
    mut rx: mpsc::Receiver<Segment>,
    store: &FlowBufferStore,
    decoder: &FrameDecoder,
    pipeline: &PipelineHandle,
    sweep_interval: Duration,
) -> u64 {
    let mut sweep = tokio::time::interval(sweep_interval.max(MIN_SWEEP_INTERVAL));
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
    sweep.tick().await;
    let mut submitted = 0;
    loop {
        tokio::select! {
            segment = rx.recv() => {
                let Some(segment) = segment else { break };
                for message in store.on_payload(segment.key, &segment.payload, decoder) {
                    debug!(flow = %segment.key, sender = %message.sender_name, "chat message decoded");
                    if let Err(err) = pipeline.submit(message.sender_name, message.text).await {
                        warn!(error = %err, "pipeline rejected message");
                        return submitted;
                    }
                    submitted += 1;
                }
            }
            _ = sweep.tick() => {
                let purged = store.purge_idle();
                if !purged.is_empty() {
                    debug!(purged = purged.len(), remaining = store.len(), "idle flows swept");
                }
            }
        }
    }
    submitted
}
