//! Interleaving scheduler.
//!
//! While a session is started, one worker thread owns the container backend.
//! It repeatedly picks the queued sample with the smallest presentation time
//! across all tracks and forwards it, sleeping on the session's
//! [`BufferSignal`] when every queue is empty.
//!
//! Ordering is greedy: only the head of each queue is considered, so a track
//! whose producer runs late can still be written out of global order. Within
//! one track FIFO order always holds.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::backend::{Backend, ContainerBackend};
use crate::error::{MuxError, MuxResult};
use crate::queue::BufferSignal;
use crate::registry::TrackInput;

/// Index of the head with the smallest pts; ties go to the lower index.
pub fn pick_earliest(heads: &[Option<i64>]) -> Option<usize> {
    let mut best: Option<(usize, i64)> = None;
    for (index, head) in heads.iter().enumerate() {
        if let Some(pts) = *head {
            if best.map_or(true, |(_, best_pts)| pts < best_pts) {
                best = Some((index, pts));
            }
        }
    }
    best.map(|(index, _)| index)
}

/// What the worker hands back when it exits.
pub(crate) struct WorkerOutcome {
    pub backend: Backend,
    /// First backend failure seen while draining.
    pub error: Option<MuxError>,
    pub written: u64,
    pub dropped: u64,
}

struct Worker {
    backend: Backend,
    tracks: Vec<Arc<TrackInput>>,
    signal: Arc<BufferSignal>,
    timeout: Duration,
    error: Option<MuxError>,
    written: u64,
    dropped: u64,
}

impl Worker {
    fn run(mut self) -> WorkerOutcome {
        debug!(tracks = self.tracks.len(), "Scheduler running");
        loop {
            let seen = self.signal.generation();
            // Read before peeking: once shutdown is visible no producer can
            // still be mid-push, so empty heads mean fully drained.
            let shutting_down = self.signal.is_shutdown();
            let heads: Vec<Option<i64>> = self.tracks.iter().map(|t| t.queue().peek_pts()).collect();

            match pick_earliest(&heads) {
                Some(index) => self.forward(index),
                None if shutting_down => break,
                None => {
                    self.signal.wait_for_change(seen, self.timeout);
                }
            }
        }

        // Configs produced by the last submitted samples.
        for index in 0..self.tracks.len() {
            self.forward_pending_config(index);
        }

        debug!(written = self.written, dropped = self.dropped, "Scheduler drained");
        WorkerOutcome {
            backend: self.backend,
            error: self.error,
            written: self.written,
            dropped: self.dropped,
        }
    }

    fn forward_pending_config(&mut self, index: usize) {
        let track = Arc::clone(&self.tracks[index]);
        let Some(config) = track.take_pending_config() else {
            return;
        };
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self.backend.update_codec_config(track.backend_id(), &config) {
            self.record(track.index(), e);
        }
    }

    fn forward(&mut self, index: usize) {
        let Some(sample) = self.tracks[index].queue().pop() else {
            return;
        };
        self.forward_pending_config(index);

        if self.error.is_some() {
            self.dropped += 1;
            return;
        }
        let track = &self.tracks[index];
        match self.backend.write_sample(track.backend_id(), &sample) {
            Ok(()) => {
                self.written += 1;
            }
            Err(e) => {
                let track_index = track.index();
                self.dropped += 1;
                self.record(track_index, e);
            }
        }
    }

    fn record(&mut self, track: usize, e: MuxError) {
        error!(track, error = %e, "Backend write failed, draining remaining samples");
        if self.error.is_none() {
            self.error = Some(e);
        }
    }
}

/// Handle to a running scheduler thread.
pub(crate) struct Scheduler {
    handle: JoinHandle<Option<WorkerOutcome>>,
    signal: Arc<BufferSignal>,
}

impl Scheduler {
    /// Move `backend` onto a new worker thread.
    ///
    /// When the thread cannot be created the backend is handed back with
    /// the error.
    pub(crate) fn spawn(
        backend: Backend,
        tracks: Vec<Arc<TrackInput>>,
        signal: Arc<BufferSignal>,
        timeout: Duration,
    ) -> Result<Self, (Option<Backend>, MuxError)> {
        // The backend waits here until the thread takes it, so a failed spawn
        // can return it to the caller.
        let slot = Arc::new(Mutex::new(Some(backend)));
        let thread_slot = Arc::clone(&slot);
        let thread_signal = Arc::clone(&signal);

        let spawned = thread::Builder::new()
            .name("mux-scheduler".into())
            .spawn(move || {
                let backend = thread_slot.lock().take()?;
                let worker = Worker {
                    backend,
                    tracks,
                    signal: thread_signal,
                    timeout,
                    error: None,
                    written: 0,
                    dropped: 0,
                };
                Some(worker.run())
            });

        match spawned {
            Ok(handle) => {
                info!(timeout_ms = timeout.as_millis() as u64, "Scheduler thread started");
                Ok(Self { handle, signal })
            }
            Err(e) => {
                let err = MuxError::Unknown(format!("Failed to spawn scheduler thread: {e}"));
                Err((slot.lock().take(), err))
            }
        }
    }

    /// Request shutdown and wait for the worker to drain every queue.
    pub(crate) fn join(self) -> MuxResult<WorkerOutcome> {
        self.signal.request_shutdown();
        self.handle
            .join()
            .map_err(|_| MuxError::Unknown("Scheduler thread panicked".into()))?
            .ok_or_else(|| MuxError::Unknown("Scheduler thread had no backend".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TrackDesc;
    use crate::normalize::parser::default_parser_factory;
    use crate::normalize::{BitstreamNormalizer, CodecConfig};
    use crate::params::MuxParameters;
    use crate::queue::SampleQueue;
    use crate::sink::DataSink;
    use mm_common::{mime, CodecKind, MediaFormat, PushPolicy, Sample, SampleFlags};

    #[derive(Default)]
    struct Log {
        writes: Vec<(i32, i64)>,
        configs: Vec<i32>,
    }

    struct Recorder {
        log: Arc<Mutex<Log>>,
        fail_on: Option<i64>,
    }

    impl ContainerBackend for Recorder {
        fn set_data_sink(&mut self, _sink: Box<dyn DataSink>) -> MuxResult<()> {
            Ok(())
        }
        fn set_parameter(&mut self, _params: &MuxParameters) -> MuxResult<()> {
            Ok(())
        }
        fn add_track(&mut self, _track: &TrackDesc) -> MuxResult<i32> {
            Ok(0)
        }
        fn start(&mut self) -> MuxResult<()> {
            Ok(())
        }
        fn write_sample(&mut self, track_id: i32, sample: &Sample) -> MuxResult<()> {
            if self.fail_on == Some(sample.pts) {
                return Err(MuxError::Unknown("disk full".into()));
            }
            self.log.lock().writes.push((track_id, sample.pts));
            Ok(())
        }
        fn update_codec_config(&mut self, track_id: i32, _config: &CodecConfig) -> MuxResult<()> {
            self.log.lock().configs.push(track_id);
            Ok(())
        }
        fn stop(&mut self) -> MuxResult<()> {
            Ok(())
        }
    }

    fn audio_track(index: usize) -> Arc<TrackInput> {
        let format = MediaFormat::audio(mime::AUDIO_MPEG, 44_100, 2);
        let normalizer =
            BitstreamNormalizer::new(CodecKind::Mp3, &format, &default_parser_factory()).unwrap();
        Arc::new(TrackInput::new(
            index,
            index as i32 + 10,
            normalizer,
            SampleQueue::new(index, 8, PushPolicy::Fail),
        ))
    }

    fn frame(pts: i64) -> Sample {
        Sample::new(vec![0xFF, 0xFB], pts, SampleFlags::SYNC_FRAME)
    }

    fn run(tracks: Vec<Arc<TrackInput>>, fail_on: Option<i64>) -> (Arc<Mutex<Log>>, WorkerOutcome) {
        let log = Arc::new(Mutex::new(Log::default()));
        let backend = Backend::custom(Box::new(Recorder {
            log: Arc::clone(&log),
            fail_on,
        }));
        let signal = Arc::new(BufferSignal::new());
        for track in &tracks {
            track.queue().attach(Arc::clone(&signal));
        }
        let scheduler = Scheduler::spawn(backend, tracks, signal, Duration::from_millis(20))
            .map_err(|(_, e)| e)
            .unwrap();
        let outcome = scheduler.join().unwrap();
        (log, outcome)
    }

    #[test]
    fn test_pick_earliest() {
        assert_eq!(pick_earliest(&[]), None);
        assert_eq!(pick_earliest(&[None, None]), None);
        assert_eq!(pick_earliest(&[Some(5), Some(3), None]), Some(1));
        assert_eq!(pick_earliest(&[None, Some(7), Some(7)]), Some(1));
        assert_eq!(pick_earliest(&[Some(-10), Some(0)]), Some(0));
    }

    #[test]
    fn test_drains_in_pts_order() {
        let audio = audio_track(0);
        let other = audio_track(1);
        for pts in [0, 1000, 2000] {
            audio.submit(frame(pts)).unwrap();
        }
        for pts in [500, 1500] {
            other.submit(frame(pts)).unwrap();
        }

        let (log, outcome) = run(vec![audio, other], None);
        assert!(outcome.error.is_none());
        assert_eq!(outcome.written, 5);
        assert_eq!(
            log.lock().writes,
            vec![(10, 0), (11, 500), (10, 1000), (11, 1500), (10, 2000)]
        );
    }

    #[test]
    fn test_first_error_kept_and_queue_drained() {
        let track = audio_track(0);
        for pts in [0, 1, 2, 3] {
            track.submit(frame(pts)).unwrap();
        }
        let (log, outcome) = run(vec![Arc::clone(&track)], Some(1));
        assert!(matches!(outcome.error, Some(MuxError::Unknown(_))));
        assert_eq!(outcome.written, 1);
        assert_eq!(outcome.dropped, 3);
        assert_eq!(log.lock().writes, vec![(10, 0)]);
        assert!(track.queue().is_empty());
    }

    #[test]
    fn test_config_update_forwarded_before_sample() {
        let format = MediaFormat::audio(mime::AUDIO_AAC, 44_100, 2);
        let normalizer =
            BitstreamNormalizer::new(CodecKind::Aac, &format, &default_parser_factory()).unwrap();
        let track = Arc::new(TrackInput::new(
            0,
            3,
            normalizer,
            SampleQueue::new(0, 4, PushPolicy::Fail),
        ));
        let adts = vec![0xFF, 0xF1, 0x50, 0x80, 0x01, 0x3F, 0xFC, 0xDE, 0xAD];
        track.submit(Sample::new(adts, 0, SampleFlags::empty())).unwrap();

        let (log, outcome) = run(vec![track], None);
        assert!(outcome.error.is_none());
        let log = log.lock();
        assert_eq!(log.configs, vec![3]);
        assert_eq!(log.writes, vec![(3, 0)]);
    }
}
