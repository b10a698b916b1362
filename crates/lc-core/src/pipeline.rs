use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use lc_capture::FrameSource;
use lc_codec::{DrainOutcome, FrameConverter, VideoEncoder};
use lc_stream::StreamSink;

use crate::error::Result;
use crate::stats::SessionStats;

const PROGRESS_INTERVAL: u64 = 60;

/// Owns the session lifecycle: wires capture, conversion, encoding, and
/// streaming together, drives the per-frame loop, and runs the flush/close
/// protocol on every exit path.
///
/// Single-threaded and cooperative: the stop flag is polled once per
/// iteration and never preempts an in-flight operation. Field order is
/// release order — transport first, then codec, then device.
pub struct Pipeline<S, C, E, K> {
    sink: K,
    encoder: E,
    converter: C,
    source: S,
    stop: Arc<AtomicBool>,
    stats: SessionStats,
    next_pts: i64,
}

impl<S, C, E, K> Pipeline<S, C, E, K>
where
    S: FrameSource,
    C: FrameConverter,
    E: VideoEncoder,
    K: StreamSink,
{
    pub fn new(source: S, converter: C, encoder: E, sink: K, stop: Arc<AtomicBool>) -> Self {
        Self {
            sink,
            encoder,
            converter,
            source,
            stop,
            stats: SessionStats::new(),
            next_pts: 0,
        }
    }

    /// Runs the session to completion: header, per-frame loop, flush,
    /// trailer. Whatever stops the loop — end of stream, the stop flag, or
    /// a stage failure — the shutdown sequence still runs; on a failure the
    /// original error wins and shutdown problems are only logged.
    pub fn run(mut self) -> Result<SessionStats> {
        self.sink.open(&self.encoder.stream_params())?;

        let streamed = self.stream();

        let flushed = if streamed.is_ok() {
            self.flush()
        } else {
            if let Err(e) = self.flush() {
                warn!("flush during error shutdown failed: {}", e);
            }
            Ok(())
        };

        if let Err(e) = self.sink.close() {
            warn!("failed to finalize stream: {}", e);
        }

        streamed?;
        flushed?;

        if self.stats.frames_captured != self.stats.packets_total() {
            warn!(
                "packet count mismatch: {} frames submitted, {} packets written",
                self.stats.frames_captured,
                self.stats.packets_total()
            );
        }

        info!(
            "session finished: {} frames, {} packets ({} recovered in flush), {} KiB",
            self.stats.frames_captured,
            self.stats.packets_total(),
            self.stats.packets_flushed,
            self.stats.bytes_streamed / 1024
        );
        Ok(self.stats)
    }

    fn stream(&mut self) -> Result<()> {
        loop {
            if self.stop.load(Ordering::Relaxed) {
                info!("stop requested, shutting down");
                return Ok(());
            }

            let Some(raw) = self.source.next_frame()? else {
                info!("capture device signalled end of stream");
                return Ok(());
            };

            let frame = self.converter.convert(&raw, self.next_pts)?;
            self.next_pts += 1;
            self.encoder.submit(&frame)?;
            self.stats.frames_captured += 1;

            self.pump(false)?;

            if self.stats.frames_captured % PROGRESS_INTERVAL == 0 {
                debug!(
                    "streamed {} frames ({} packets, {} KiB)",
                    self.stats.frames_captured,
                    self.stats.packets_total(),
                    self.stats.bytes_streamed / 1024
                );
            }
        }
    }

    /// Pulls every packet the encoder has ready and writes it out. Returns
    /// true once the encoder reports that the flush has completed.
    fn pump(&mut self, flushing: bool) -> Result<bool> {
        loop {
            match self.encoder.drain()? {
                DrainOutcome::Packet(packet) => {
                    let size = packet.size() as u64;
                    self.sink.write_packet(&packet)?;
                    if flushing {
                        self.stats.packets_flushed += 1;
                    } else {
                        self.stats.packets_streamed += 1;
                    }
                    self.stats.bytes_streamed += size;
                }
                DrainOutcome::Pending => return Ok(false),
                DrainOutcome::Finished => return Ok(true),
            }
        }
    }

    /// Shutdown half of the encoder protocol: submit the end-of-stream
    /// sentinel, then drain until the terminal signal so no submitted frame
    /// is left inside the codec.
    fn flush(&mut self) -> Result<()> {
        self.encoder.begin_flush()?;
        while !self.pump(true)? {}
        debug!(
            "encoder flushed: {} packets recovered",
            self.stats.packets_flushed
        );
        Ok(())
    }
}
