//! Track registry: container allow-lists, track format validation, and the
//! per-track ingest handle shared between producers and the scheduler.

use std::sync::Arc;

use mm_common::{keys, mime, CodecKind, FormatError, MediaFormat, MediaKind, OutputFormat, Sample};
use parking_lot::Mutex;

use crate::error::{MuxError, MuxResult};
use crate::normalize::{BitstreamNormalizer, CodecConfig};
use crate::params::MuxParameters;
use crate::queue::SampleQueue;

static MP4_MIMES: &[&str] = &[
    mime::AUDIO_AAC,
    mime::AUDIO_MPEG,
    mime::VIDEO_AVC,
    mime::VIDEO_MPEG4,
    mime::VIDEO_HEVC,
    mime::IMAGE_JPG,
    mime::IMAGE_PNG,
    mime::IMAGE_BMP,
    mime::TIMED_METADATA,
];

static M4A_MIMES: &[&str] = &[
    mime::AUDIO_AAC,
    mime::IMAGE_JPG,
    mime::IMAGE_PNG,
    mime::IMAGE_BMP,
];

static AMR_MIMES: &[&str] = &[mime::AUDIO_AMR_NB, mime::AUDIO_AMR_WB];

static MP3_MIMES: &[&str] = &[mime::AUDIO_MPEG];

static WAV_MIMES: &[&str] = &[mime::AUDIO_RAW];

/// Mime types a container accepts.
pub fn allowed_mimes(format: OutputFormat) -> &'static [&'static str] {
    match format.resolve() {
        OutputFormat::Mp4 | OutputFormat::Default => MP4_MIMES,
        OutputFormat::M4a => M4A_MIMES,
        OutputFormat::Amr => AMR_MIMES,
        OutputFormat::Mp3 => MP3_MIMES,
        OutputFormat::Wav => WAV_MIMES,
    }
}

pub fn is_mime_allowed(format: OutputFormat, mime: &str) -> bool {
    allowed_mimes(format).contains(&mime)
}

/// Largest width or height a visual track may declare.
pub const MAX_DIMENSION: i32 = 65_535;

/// Largest reorder depth accepted in `video_delay`.
pub const MAX_VIDEO_DELAY: i32 = 16;

/// A mandatory key: absence is invalid data, a wrong type is a type mismatch.
fn required_int(format: &MediaFormat, key: &str) -> MuxResult<i32> {
    format.get_int(key).map_err(|e| match e {
        FormatError::Missing(key) => {
            MuxError::InvalidData(format!("Track format is missing mandatory key '{key}'"))
        }
        other => other.into(),
    })
}

fn required_string<'a>(format: &'a MediaFormat, key: &str) -> MuxResult<&'a str> {
    format.get_string(key).map_err(|e| match e {
        FormatError::Missing(key) => {
            MuxError::InvalidData(format!("Track format is missing mandatory key '{key}'"))
        }
        other => other.into(),
    })
}

/// Validate a track format against the container and the tracks added so
/// far. Returns the resolved codec.
pub fn validate_track_format(
    format: &MediaFormat,
    output: OutputFormat,
    params: &MuxParameters,
    existing: &TrackRegistry,
) -> MuxResult<CodecKind> {
    let mime = format.mime().map_err(|e| match e {
        FormatError::Missing(_) => MuxError::InvalidData("Track format has no mime type".into()),
        other => other.into(),
    })?;

    let codec = CodecKind::from_mime(mime)
        .ok_or_else(|| MuxError::UnsupportedFormat(format!("Unknown mime type '{mime}'")))?;
    if !is_mime_allowed(output, mime) {
        return Err(MuxError::UnsupportedFormat(format!(
            "{mime} cannot be stored in {:?} output",
            output.resolve()
        )));
    }

    match codec.media_kind() {
        MediaKind::Audio => {
            let sample_rate = required_int(format, keys::SAMPLE_RATE)?;
            let channels = required_int(format, keys::CHANNEL_COUNT)?;
            if sample_rate <= 0 || channels <= 0 {
                return Err(MuxError::InvalidData(format!(
                    "Audio sample rate {sample_rate} and channel count {channels} must be positive"
                )));
            }
        }
        kind @ (MediaKind::Video | MediaKind::Image) => {
            let width = required_int(format, keys::WIDTH)?;
            let height = required_int(format, keys::HEIGHT)?;
            let range = 1..=MAX_DIMENSION;
            if !range.contains(&width) || !range.contains(&height) {
                return Err(MuxError::InvalidData(format!(
                    "Dimensions {width}x{height} outside 1..={MAX_DIMENSION}"
                )));
            }
            if kind == MediaKind::Video {
                validate_video_delay(format)?;
            }
        }
        MediaKind::TimedMetadata => {
            if !params.timed_metadata_enabled() {
                return Err(MuxError::InvalidOperation(
                    "Timed metadata tracks require enable_timed_metadata".into(),
                ));
            }
            required_string(format, keys::TIMED_METADATA_KEY)?;
            let source = required_int(format, keys::SRC_TRACK_ID)?;
            let is_video = usize::try_from(source)
                .ok()
                .and_then(|i| existing.get(i))
                .is_some_and(|t| t.codec().media_kind() == MediaKind::Video);
            if !is_video {
                return Err(MuxError::InvalidData(format!(
                    "src_track_id {source} does not name a video track"
                )));
            }
        }
    }

    Ok(codec)
}

fn validate_video_delay(format: &MediaFormat) -> MuxResult<()> {
    let Some(delay) = format.opt_int(keys::VIDEO_DELAY)? else {
        return Ok(());
    };
    if !(0..=MAX_VIDEO_DELAY).contains(&delay) {
        return Err(MuxError::InvalidData(format!(
            "video_delay {delay} outside 0..={MAX_VIDEO_DELAY}"
        )));
    }
    if delay > 0 {
        let frame_rate = format.opt_double(keys::FRAME_RATE)?.unwrap_or(0.0);
        if frame_rate <= 0.0 {
            return Err(MuxError::InvalidData(
                "video_delay requires a positive frame_rate".into(),
            ));
        }
    }
    Ok(())
}

/// Per-track state shared by producers and the scheduler.
pub struct TrackInput {
    index: usize,
    backend_id: i32,
    codec: CodecKind,
    queue: SampleQueue,
    normalizer: Mutex<BitstreamNormalizer>,
    pending_config: Mutex<Option<CodecConfig>>,
}

impl TrackInput {
    pub(crate) fn new(
        index: usize,
        backend_id: i32,
        normalizer: BitstreamNormalizer,
        queue: SampleQueue,
    ) -> Self {
        Self {
            index,
            backend_id,
            codec: normalizer.codec(),
            queue,
            normalizer: Mutex::new(normalizer),
            pending_config: Mutex::new(None),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn backend_id(&self) -> i32 {
        self.backend_id
    }

    pub fn codec(&self) -> CodecKind {
        self.codec
    }

    pub(crate) fn queue(&self) -> &SampleQueue {
        &self.queue
    }

    /// Normalize and enqueue one sample.
    ///
    /// The normalizer lock is held across the push so samples of one track
    /// reach the queue in the order they were normalized.
    pub(crate) fn submit(&self, sample: Sample) -> MuxResult<()> {
        if sample.is_empty() && !sample.is_eos() {
            return Err(MuxError::InvalidParameter(format!(
                "Empty payload on track {}",
                self.index
            )));
        }

        let mut normalizer = self.normalizer.lock();
        let normalized = normalizer.process(sample)?;
        if let Some(config) = normalized.config_update {
            tracing::debug!(track = self.index, bytes = config.extradata.len(), "Codec config updated");
            *self.pending_config.lock() = Some(config);
        }
        match normalized.sample {
            Some(sample) => self.queue.push(sample),
            None => Ok(()),
        }
    }

    /// Configuration update not yet forwarded to the backend.
    pub(crate) fn take_pending_config(&self) -> Option<CodecConfig> {
        self.pending_config.lock().take()
    }
}

/// Producer endpoint for one track's queue.
///
/// Obtained from `MuxSession::input_buffer_queue` before start; samples pushed
/// here go through the same normalization as `MuxSession::write_sample`.
#[derive(Clone)]
pub struct SampleQueueProducer {
    track: Arc<TrackInput>,
}

impl SampleQueueProducer {
    pub(crate) fn new(track: Arc<TrackInput>) -> Self {
        Self { track }
    }

    pub fn push(&self, sample: Sample) -> MuxResult<()> {
        self.track.submit(sample)
    }

    pub fn track_index(&self) -> usize {
        self.track.index()
    }

    /// Samples waiting in the queue.
    pub fn len(&self) -> usize {
        self.track.queue().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.track.queue().capacity()
    }
}

impl std::fmt::Debug for SampleQueueProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleQueueProducer")
            .field("track", &self.track.index())
            .field("codec", &self.track.codec())
            .finish()
    }
}

/// Ordered list of a session's tracks; indices are never reused.
#[derive(Default)]
pub struct TrackRegistry {
    tracks: Vec<Arc<TrackInput>>,
}

impl TrackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_index(&self) -> usize {
        self.tracks.len()
    }

    pub(crate) fn push(&mut self, track: TrackInput) -> usize {
        let index = track.index();
        debug_assert_eq!(index, self.tracks.len());
        self.tracks.push(Arc::new(track));
        index
    }

    pub fn get(&self, index: usize) -> Option<&Arc<TrackInput>> {
        self.tracks.get(index)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TrackInput>> {
        self.tracks.iter()
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<TrackInput>> {
        self.tracks.clone()
    }
}
