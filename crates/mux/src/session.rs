//! `MuxSession`: the public engine handle.
//!
//! A session walks `Uninitialized -> Initialized -> Started -> Stopped`.
//! Tracks and parameters are configured while initialized; once started the
//! backend lives on the scheduler thread and callers only enqueue samples.
//! Every call that fails leaves the phase unchanged, except `stop`, which is
//! terminal either way.

use std::sync::Arc;

use mm_common::{keys, MediaFormat, MediaKind, MuxerConfig, OutputFormat, Sample};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::backend::{Backend, ContainerBackend, TrackDesc};
use crate::error::{MuxError, MuxResult};
use crate::normalize::parser::{default_parser_factory, ParserFactory};
use crate::normalize::BitstreamNormalizer;
use crate::params::MuxParameters;
use crate::queue::{BufferSignal, SampleQueue};
use crate::registry::{validate_track_format, SampleQueueProducer, TrackInput, TrackRegistry};
use crate::scheduler::Scheduler;
use crate::sink::{validate_sink, DataSink};

/// Lifecycle phase of a [`MuxSession`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Uninitialized,
    Initialized,
    Started,
    Stopped,
}

struct Inner {
    phase: Phase,
    output: Option<OutputFormat>,
    /// Owned here until start, then by the scheduler thread.
    backend: Option<Backend>,
    tracks: TrackRegistry,
    params: MuxParameters,
    scheduler: Option<Scheduler>,
}

impl Inner {
    fn expect_phase(&self, op: &str, phase: Phase) -> MuxResult<()> {
        if self.phase != phase {
            return Err(MuxError::wrong_state(op, self.phase));
        }
        Ok(())
    }

    fn backend(&mut self) -> MuxResult<&mut Backend> {
        self.backend
            .as_mut()
            .ok_or_else(|| MuxError::Unknown("Session has no backend".into()))
    }
}

/// Multi-track muxing session.
///
/// All methods take `&self`; a session can be shared between producer
/// threads behind an `Arc`.
pub struct MuxSession {
    inner: Mutex<Inner>,
    config: MuxerConfig,
    parsers: ParserFactory,
}

impl Default for MuxSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MuxSession {
    pub fn new() -> Self {
        Self::with_config(MuxerConfig::default())
    }

    pub fn with_config(config: MuxerConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                phase: Phase::Uninitialized,
                output: None,
                backend: None,
                tracks: TrackRegistry::new(),
                params: MuxParameters::default(),
                scheduler: None,
            }),
            config,
            parsers: default_parser_factory(),
        }
    }

    /// Replace the bitstream parser factory used by tracks added later.
    pub fn with_parser_factory(mut self, parsers: ParserFactory) -> Self {
        self.parsers = parsers;
        self
    }

    pub fn config(&self) -> &MuxerConfig {
        &self.config
    }

    /// Bind the output sink and pick the backend for `format`.
    pub fn init(&self, sink: Box<dyn DataSink>, format: OutputFormat) -> MuxResult<()> {
        let format = format.resolve();
        self.attach(sink, format, Backend::for_format(format))
    }

    /// Like [`MuxSession::init`] with a caller-supplied backend. `format`
    /// still selects the mime allow-list.
    pub fn init_with_backend(
        &self,
        sink: Box<dyn DataSink>,
        format: OutputFormat,
        backend: Box<dyn ContainerBackend>,
    ) -> MuxResult<()> {
        self.attach(sink, format.resolve(), Backend::custom(backend))
    }

    fn attach(&self, mut sink: Box<dyn DataSink>, format: OutputFormat, mut backend: Backend) -> MuxResult<()> {
        let mut inner = self.inner.lock();
        inner.expect_phase("init", Phase::Uninitialized)?;
        validate_sink(sink.as_mut())?;
        backend.set_data_sink(sink)?;

        info!(format = ?format, backend = backend.name(), "Mux session initialized");
        inner.output = Some(format);
        inner.backend = Some(backend);
        inner.phase = Phase::Initialized;
        Ok(())
    }

    /// Validate `params` and merge them into the set applied at start.
    pub fn set_parameter(&self, params: &MuxParameters) -> MuxResult<()> {
        let mut inner = self.inner.lock();
        inner.expect_phase("set_parameter", Phase::Initialized)?;
        params.validate()?;
        inner.params.merge(params);
        debug!(?params, "Parameters buffered");
        Ok(())
    }

    pub fn set_rotation(&self, degrees: i32) -> MuxResult<()> {
        self.set_parameter(&MuxParameters::new().with_rotation(degrees))
    }

    /// Add a track; returns its index (0, 1, 2, ... in call order).
    pub fn add_track(&self, format: &MediaFormat) -> MuxResult<usize> {
        let mut inner = self.inner.lock();
        inner.expect_phase("add_track", Phase::Initialized)?;
        let output = inner.output.unwrap_or_default().resolve();

        let codec = validate_track_format(format, output, &inner.params, &inner.tracks)?;
        let normalizer = BitstreamNormalizer::new(codec, format, &self.parsers)?;

        let source_track = if codec.media_kind() == MediaKind::TimedMetadata {
            let source = format.get_int(keys::SRC_TRACK_ID)?;
            usize::try_from(source)
                .ok()
                .and_then(|i| inner.tracks.get(i))
                .map(|t| t.backend_id())
        } else {
            None
        };
        let desc = TrackDesc {
            codec,
            format: format.clone(),
            config: normalizer.codec_config().clone(),
            source_track,
        };

        let backend_id = inner.backend()?.add_track(&desc)?;
        if backend_id < 0 {
            return Err(MuxError::InvalidData(format!(
                "Backend returned track id {backend_id}"
            )));
        }

        let index = inner.tracks.next_index();
        let queue = SampleQueue::new(index, self.config.queue_capacity, self.config.push_policy);
        inner
            .tracks
            .push(TrackInput::new(index, backend_id, normalizer, queue));

        info!(index, backend_id, codec = codec.display_name(), "Track added");
        Ok(index)
    }

    /// Producer endpoint for a track, available until start.
    pub fn input_buffer_queue(&self, track_index: usize) -> Option<SampleQueueProducer> {
        let inner = self.inner.lock();
        if inner.phase != Phase::Initialized {
            return None;
        }
        inner
            .tracks
            .get(track_index)
            .map(|track| SampleQueueProducer::new(Arc::clone(track)))
    }

    /// Write the container header and hand the backend to the scheduler.
    pub fn start(&self) -> MuxResult<()> {
        let mut inner = self.inner.lock();
        inner.expect_phase("start", Phase::Initialized)?;
        if inner.tracks.is_empty() {
            return Err(MuxError::InvalidOperation("Cannot start without tracks".into()));
        }

        let params = inner.params.clone();
        let backend = inner.backend()?;
        backend.set_parameter(&params)?;
        backend.start()?;

        let signal = Arc::new(BufferSignal::new());
        for track in inner.tracks.iter() {
            track.queue().attach(Arc::clone(&signal));
        }

        let Some(backend) = inner.backend.take() else {
            return Err(MuxError::Unknown("Session has no backend".into()));
        };
        let tracks = inner.tracks.snapshot();
        match Scheduler::spawn(backend, tracks, signal, self.config.wait_timeout()) {
            Ok(scheduler) => {
                inner.scheduler = Some(scheduler);
                inner.phase = Phase::Started;
                info!(tracks = inner.tracks.len(), "Mux session started");
                Ok(())
            }
            Err((backend, e)) => {
                for track in inner.tracks.iter() {
                    track.queue().detach();
                }
                inner.backend = backend;
                Err(e)
            }
        }
    }

    /// Normalize and enqueue a sample on a track.
    ///
    /// The session lock is released before the push, so producers on
    /// different tracks do not serialize on each other.
    pub fn write_sample(&self, track_index: usize, sample: Sample) -> MuxResult<()> {
        let track = {
            let inner = self.inner.lock();
            inner.expect_phase("write_sample", Phase::Started)?;
            inner.tracks.get(track_index).cloned().ok_or_else(|| {
                MuxError::InvalidParameter(format!(
                    "Track index {track_index} out of range ({} tracks)",
                    inner.tracks.len()
                ))
            })?
        };
        track.submit(sample)
    }

    /// Drain every queue, write the trailer and flush the sink.
    ///
    /// The session is stopped afterwards even when an error is returned.
    pub fn stop(&self) -> MuxResult<()> {
        let mut inner = self.inner.lock();
        inner.expect_phase("stop", Phase::Started)?;
        inner.phase = Phase::Stopped;

        for track in inner.tracks.iter() {
            track.queue().detach();
            track.queue().close();
        }

        let Some(scheduler) = inner.scheduler.take() else {
            return Err(MuxError::Unknown("Session has no scheduler".into()));
        };
        let outcome = scheduler.join()?;
        let mut backend = outcome.backend;
        let stop_result = backend.stop();

        info!(
            written = outcome.written,
            dropped = outcome.dropped,
            failed = outcome.error.is_some() || stop_result.is_err(),
            "Mux session stopped"
        );
        if outcome.dropped > 0 {
            warn!(dropped = outcome.dropped, "Samples dropped after a backend error");
        }

        match outcome.error {
            Some(e) => Err(e),
            None => stop_result,
        }
    }

    pub fn phase(&self) -> Phase {
        self.inner.lock().phase
    }

    pub fn track_count(&self) -> usize {
        self.inner.lock().tracks.len()
    }

    /// Resolved output format, once initialized.
    pub fn output_format(&self) -> Option<OutputFormat> {
        self.inner.lock().output
    }
}

impl Drop for MuxSession {
    fn drop(&mut self) {
        if self.phase() == Phase::Started {
            if let Err(e) = self.stop() {
                warn!(error = %e, "Implicit stop on drop failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use mm_common::{mime, SampleFlags};

    fn started_mp3() -> (MuxSession, MemorySink) {
        let sink = MemorySink::new();
        let session = MuxSession::new();
        session.init(Box::new(sink.clone()), OutputFormat::Mp3).unwrap();
        session
            .add_track(&MediaFormat::audio(mime::AUDIO_MPEG, 44_100, 2))
            .unwrap();
        session.start().unwrap();
        (session, sink)
    }

    #[test]
    fn test_phase_transitions() {
        let session = MuxSession::new();
        assert_eq!(session.phase(), Phase::Uninitialized);
        assert!(matches!(session.start(), Err(MuxError::InvalidOperation(_))));

        session.init(Box::new(MemorySink::new()), OutputFormat::Default).unwrap();
        assert_eq!(session.phase(), Phase::Initialized);
        assert_eq!(session.output_format(), Some(OutputFormat::Mp4));
        assert!(matches!(
            session.init(Box::new(MemorySink::new()), OutputFormat::Mp4),
            Err(MuxError::InvalidOperation(_))
        ));

        // no tracks yet
        assert!(matches!(session.start(), Err(MuxError::InvalidOperation(_))));
        assert_eq!(session.phase(), Phase::Initialized);
    }

    #[test]
    fn test_write_before_start_rejected() {
        let session = MuxSession::new();
        session.init(Box::new(MemorySink::new()), OutputFormat::Mp3).unwrap();
        session
            .add_track(&MediaFormat::audio(mime::AUDIO_MPEG, 44_100, 2))
            .unwrap();
        let err = session
            .write_sample(0, Sample::new(vec![1], 0, SampleFlags::SYNC_FRAME))
            .unwrap_err();
        assert!(matches!(err, MuxError::InvalidOperation(_)));
    }

    #[test]
    fn test_write_sample_index_and_payload_checks() {
        let (session, _sink) = started_mp3();
        assert!(matches!(
            session.write_sample(3, Sample::new(vec![1], 0, SampleFlags::SYNC_FRAME)),
            Err(MuxError::InvalidParameter(_))
        ));
        assert!(matches!(
            session.write_sample(0, Sample::new(Vec::new(), 0, SampleFlags::SYNC_FRAME)),
            Err(MuxError::InvalidParameter(_))
        ));
        session.write_sample(0, Sample::end_of_stream(0)).unwrap();
        session.stop().unwrap();
    }

    #[test]
    fn test_stop_is_terminal() {
        let (session, sink) = started_mp3();
        session
            .write_sample(0, Sample::new(vec![0xFF, 0xFB, 0x10], 0, SampleFlags::SYNC_FRAME))
            .unwrap();
        session.stop().unwrap();
        assert_eq!(session.phase(), Phase::Stopped);
        assert_eq!(sink.contents(), vec![0xFF, 0xFB, 0x10]);
        assert!(matches!(session.stop(), Err(MuxError::InvalidOperation(_))));
        assert!(matches!(session.start(), Err(MuxError::InvalidOperation(_))));
        assert!(matches!(
            session.add_track(&MediaFormat::audio(mime::AUDIO_MPEG, 44_100, 2)),
            Err(MuxError::InvalidOperation(_))
        ));
        assert!(matches!(
            session.write_sample(0, Sample::new(vec![0xFF, 0xFB], 1, SampleFlags::SYNC_FRAME)),
            Err(MuxError::InvalidOperation(_))
        ));
        assert_eq!(session.phase(), Phase::Stopped);
        assert_eq!(session.track_count(), 1);
    }

    #[test]
    fn test_input_buffer_queue_only_before_start() {
        let session = MuxSession::new();
        session.init(Box::new(MemorySink::new()), OutputFormat::Mp3).unwrap();
        session
            .add_track(&MediaFormat::audio(mime::AUDIO_MPEG, 44_100, 2))
            .unwrap();
        assert!(session.input_buffer_queue(1).is_none());
        let producer = session.input_buffer_queue(0).unwrap();
        assert_eq!(producer.capacity(), 10);
        session.start().unwrap();
        assert!(session.input_buffer_queue(0).is_none());
    }

    #[test]
    fn test_set_parameter_validation_keeps_state() {
        let session = MuxSession::new();
        assert!(matches!(session.set_rotation(90), Err(MuxError::InvalidOperation(_))));
        session.init(Box::new(MemorySink::new()), OutputFormat::Mp4).unwrap();
        assert!(matches!(session.set_rotation(45), Err(MuxError::InvalidData(_))));
        session.set_rotation(270).unwrap();
        assert_eq!(session.phase(), Phase::Initialized);
    }

    #[test]
    fn test_drop_stops_started_session() {
        let (session, sink) = started_mp3();
        session
            .write_sample(0, Sample::new(vec![0xAA], 0, SampleFlags::SYNC_FRAME))
            .unwrap();
        drop(session);
        assert_eq!(sink.contents(), vec![0xAA]);
    }
}
