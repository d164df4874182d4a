//! Periodic magnitude publisher
//!
//! A single named worker thread ticks at a fixed interval, snapshots the
//! latest FFT magnitudes through [`FftResultProvider`], packs them into
//! a binary frame, and hands the frame to the transport. All buffers are
//! pre-allocated at construction; the tick path allocates nothing.
//!
//! # Packet layout (big-endian)
//!
//! | offset | size | field           | type        |
//! |--------|------|-----------------|-------------|
//! | 0      | 4    | sequence        | u32         |
//! | 4      | 8    | timestamp_ns    | i64         |
//! | 12     | 2    | magnitude_count | u16         |
//! | 14     | 4×N  | magnitudes      | f32 × N     |
//!
//! `N` is fft_size/2 + 1, so the packet is 14 + 4N bytes. Sequence
//! numbers are strictly increasing (wrapping) within one start/stop
//! session; the network may still drop or reorder datagrams.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::{BufMut, BytesMut};

use crate::analysis::FftResultProvider;

use super::Transport;

/// Packet header size in bytes.
pub const HEADER_LEN: usize = 14;

/// Fallback interval when the configured one is not positive (~60 Hz).
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(16);

/// Pre-allocated per-tick working set, moved into the worker thread.
struct TickScratch {
    /// Destination for the f64 magnitude snapshot.
    magnitudes: Vec<f64>,
    /// Narrowed copy for wire packing.
    packed: Vec<f32>,
    /// Reusable outgoing frame.
    frame: BytesMut,
    sequence: u32,
}

impl TickScratch {
    fn new(magnitude_count: usize) -> Self {
        Self {
            magnitudes: vec![0.0; magnitude_count],
            packed: vec![0.0; magnitude_count],
            frame: BytesMut::with_capacity(HEADER_LEN + 4 * magnitude_count),
            sequence: 0,
        }
    }
}

/// Ticker-driven task that publishes magnitude frames to a transport.
///
/// Started and stopped at most once per instance; `stop` waits for the
/// worker to exit (worst case one interval after the signal).
pub struct Publisher {
    interval: Duration,
    sender: Arc<dyn Transport>,
    provider: Arc<dyn FftResultProvider>,

    /// Present until `start` moves it into the worker.
    scratch: Option<TickScratch>,
    shutdown_tx: Option<flume::Sender<()>>,
    worker: Option<JoinHandle<()>>,
    /// Set once the worker has been joined; instances are single-shot.
    stopped: bool,
}

impl Publisher {
    /// Create a publisher tied to an FFT provider. A non-positive
    /// interval is clamped to [`DEFAULT_INTERVAL`] with a warning.
    pub fn new(
        interval: Duration,
        sender: Arc<dyn Transport>,
        provider: Arc<dyn FftResultProvider>,
    ) -> Publisher {
        let interval = if interval.is_zero() {
            log::warn!(
                "publisher: invalid interval, defaulting to {:?}",
                DEFAULT_INTERVAL
            );
            DEFAULT_INTERVAL
        } else {
            interval
        };

        let magnitude_count = provider.fft_size() / 2 + 1;
        log::info!(
            "publisher: initializing (interval {:?}, {} bins)",
            interval,
            magnitude_count
        );

        Publisher {
            interval,
            sender,
            provider,
            scratch: Some(TickScratch::new(magnitude_count)),
            shutdown_tx: None,
            worker: None,
            stopped: false,
        }
    }

    /// Spawn the worker thread. Safe to call repeatedly: a running
    /// publisher stays running, and a stopped instance will not restart.
    pub fn start(&mut self) {
        if self.worker.is_some() {
            log::warn!("publisher: start called but already running");
            return;
        }
        if self.stopped {
            log::warn!("publisher: start called after stop; instances are single-shot");
            return;
        }
        let mut scratch = match self.scratch.take() {
            Some(s) => s,
            None => return,
        };

        let (shutdown_tx, shutdown_rx) = flume::bounded::<()>(1);
        let sender = self.sender.clone();
        let provider = self.provider.clone();
        let interval = self.interval;

        let worker = thread::Builder::new()
            .name("spectra-publisher".to_string())
            .spawn(move || {
                log::info!("publisher: worker started (interval {:?})", interval);
                loop {
                    match shutdown_rx.recv_timeout(interval) {
                        Err(flume::RecvTimeoutError::Timeout) => {
                            publish_tick(&*sender, &*provider, &mut scratch);
                        }
                        Ok(()) | Err(flume::RecvTimeoutError::Disconnected) => break,
                    }
                }
                log::info!("publisher: worker stopped");
            })
            .expect("failed to spawn publisher thread");

        self.shutdown_tx = Some(shutdown_tx);
        self.worker = Some(worker);
    }

    /// Signal shutdown and wait for the worker to exit. Idempotent.
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(worker) = self.worker.take() {
            log::debug!("publisher: waiting for worker to finish...");
            let _ = worker.join();
            self.stopped = true;
        }
    }

    /// Alias for [`stop`](Self::stop), for uniform component lifecycle.
    pub fn close(&mut self) {
        self.stop();
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One tick: snapshot, narrow, pack, send. Errors never kill the loop —
/// a failed read skips the tick, a failed send is already de-noised by
/// the sender.
fn publish_tick(sender: &dyn Transport, provider: &dyn FftResultProvider, s: &mut TickScratch) {
    if let Err(e) = provider.magnitudes_into(&mut s.magnitudes) {
        log::error!("publisher: error reading magnitudes: {}", e);
        return;
    }

    for (dst, src) in s.packed.iter_mut().zip(s.magnitudes.iter()) {
        *dst = *src as f32;
    }

    s.sequence = s.sequence.wrapping_add(1);
    let timestamp_ns = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as i64;

    s.frame.clear();
    s.frame.put_u32(s.sequence);
    s.frame.put_i64(timestamp_ns);
    s.frame.put_u16(s.packed.len() as u16);
    for &m in &s.packed {
        s.frame.put_f32(m);
    }

    match sender.send(&s.frame) {
        Ok(()) => log::debug!(
            "publisher: sent packet {} ({} bytes)",
            s.sequence,
            s.frame.len()
        ),
        Err(e) => log::debug!("publisher: send failed for packet {}: {}", s.sequence, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::{FftProcessor, WindowKind};
    use crate::net::NetResult;
    use std::sync::Mutex as StdMutex;

    const FFT_SIZE: usize = 1024;
    const SAMPLE_RATE: f64 = 44100.0;
    const MAGNITUDE_COUNT: usize = FFT_SIZE / 2 + 1;

    /// Transport that records every packet it is handed.
    struct CapturingTransport {
        packets: StdMutex<Vec<Vec<u8>>>,
    }

    impl CapturingTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                packets: StdMutex::new(Vec::new()),
            })
        }

        fn packets(&self) -> Vec<Vec<u8>> {
            self.packets.lock().unwrap().clone()
        }
    }

    impl Transport for CapturingTransport {
        fn send(&self, data: &[u8]) -> NetResult<()> {
            self.packets.lock().unwrap().push(data.to_vec());
            Ok(())
        }

        fn close(&self) -> NetResult<()> {
            Ok(())
        }
    }

    fn parse_header(packet: &[u8]) -> (u32, i64, u16) {
        let seq = u32::from_be_bytes(packet[0..4].try_into().unwrap());
        let ts = i64::from_be_bytes(packet[4..12].try_into().unwrap());
        let count = u16::from_be_bytes(packet[12..14].try_into().unwrap());
        (seq, ts, count)
    }

    fn sine_processor() -> FftProcessor {
        let mut fft = FftProcessor::new(FFT_SIZE, SAMPLE_RATE, WindowKind::Hann).unwrap();
        let signal: Vec<i32> = (0..FFT_SIZE)
            .map(|i| {
                let phase = 2.0 * std::f64::consts::PI * 1000.0 * i as f64 / SAMPLE_RATE;
                (phase.sin() * 0.9 * i32::MAX as f64) as i32
            })
            .collect();
        crate::analysis::AudioProcessor::process(&mut fft, &signal);
        fft
    }

    #[test]
    fn test_packets_have_layout_and_monotonic_sequence() {
        let fft = sine_processor();
        let transport = CapturingTransport::new();
        let mut publisher = Publisher::new(
            Duration::from_millis(5),
            transport.clone(),
            Arc::new(fft.handle()),
        );

        publisher.start();
        std::thread::sleep(Duration::from_millis(120));
        publisher.stop();

        let packets = transport.packets();
        assert!(
            packets.len() >= 4,
            "expected several packets in 120ms at 5ms interval, got {}",
            packets.len()
        );

        let expected_magnitudes: Vec<f32> = {
            use crate::analysis::FftResultProvider;
            fft.handle().magnitudes().iter().map(|&m| m as f32).collect()
        };

        for (i, packet) in packets.iter().enumerate() {
            let (seq, ts, count) = parse_header(packet);
            assert_eq!(seq, i as u32 + 1, "sequence numbers start at 1 and increase");
            assert!(ts > 0);
            assert_eq!(count as usize, MAGNITUDE_COUNT);
            assert_eq!(packet.len(), HEADER_LEN + 4 * MAGNITUDE_COUNT);

            let payload: Vec<f32> = packet[HEADER_LEN..]
                .chunks_exact(4)
                .map(|b| f32::from_be_bytes(b.try_into().unwrap()))
                .collect();
            assert_eq!(payload, expected_magnitudes);
        }
    }

    #[test]
    fn test_zero_interval_clamps_to_default() {
        let fft = sine_processor();
        let publisher = Publisher::new(
            Duration::ZERO,
            CapturingTransport::new(),
            Arc::new(fft.handle()),
        );
        assert_eq!(publisher.interval, DEFAULT_INTERVAL);
    }

    #[test]
    fn test_start_is_idempotent_and_instances_are_single_shot() {
        let fft = sine_processor();
        let transport = CapturingTransport::new();
        let mut publisher = Publisher::new(
            Duration::from_millis(5),
            transport.clone(),
            Arc::new(fft.handle()),
        );

        publisher.start();
        publisher.start(); // no-op
        std::thread::sleep(Duration::from_millis(30));
        publisher.stop();
        publisher.stop(); // no-op

        let after_stop = transport.packets().len();
        assert!(after_stop >= 1);

        // A stopped instance must not restart.
        publisher.start();
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(transport.packets().len(), after_stop);
    }

    #[test]
    fn test_stop_latency_is_bounded_by_interval() {
        let fft = sine_processor();
        let mut publisher = Publisher::new(
            Duration::from_millis(50),
            CapturingTransport::new(),
            Arc::new(fft.handle()),
        );

        publisher.start();
        let begin = std::time::Instant::now();
        publisher.stop();
        assert!(
            begin.elapsed() < Duration::from_millis(150),
            "stop must return within roughly one interval"
        );
    }
}
