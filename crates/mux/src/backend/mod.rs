//! Container backends.
//!
//! A backend serializes forwarded samples into one container format. The
//! engine only talks to the [`ContainerBackend`] trait; [`Backend`] picks the
//! built-in implementation for an [`OutputFormat`].

pub mod amr;
pub mod atoms;
pub mod mp3;
pub mod mp4;
pub mod wav;

use mm_common::{CodecKind, MediaFormat, OutputFormat, Sample};

use crate::error::{MuxError, MuxResult};
use crate::normalize::CodecConfig;
use crate::params::MuxParameters;
use crate::sink::DataSink;

pub use amr::AmrWriter;
pub use mp3::Mp3Writer;
pub use mp4::{Brand, Mp4Writer};
pub use wav::WavWriter;

/// Track as announced to a backend by `add_track`.
#[derive(Clone, Debug)]
pub struct TrackDesc {
    pub codec: CodecKind,
    pub format: MediaFormat,
    /// Configuration known at add time (from the track format).
    pub config: CodecConfig,
    /// Backend id of the track a timed-metadata track describes.
    pub source_track: Option<i32>,
}

/// Backend contract driven by the session and the scheduler thread.
///
/// Calls arrive in this order: `set_data_sink`, then any number of
/// `add_track`, optionally `set_parameter`, `start`, then interleaved
/// `write_sample` / `update_codec_config`, and finally `stop`.
pub trait ContainerBackend: Send {
    fn set_data_sink(&mut self, sink: Box<dyn DataSink>) -> MuxResult<()>;

    fn set_parameter(&mut self, params: &MuxParameters) -> MuxResult<()>;

    /// Register a track; returns a backend id (>= 0).
    fn add_track(&mut self, track: &TrackDesc) -> MuxResult<i32>;

    /// Write the container header.
    fn start(&mut self) -> MuxResult<()>;

    fn write_sample(&mut self, track_id: i32, sample: &Sample) -> MuxResult<()>;

    fn update_codec_config(&mut self, track_id: i32, config: &CodecConfig) -> MuxResult<()>;

    /// Write the trailer and flush the sink.
    fn stop(&mut self) -> MuxResult<()>;
}

/// Built-in backend for each output format, or an injected one.
pub enum Backend {
    Mp4(Mp4Writer),
    M4a(Mp4Writer),
    Amr(AmrWriter),
    Mp3(Mp3Writer),
    Wav(WavWriter),
    Custom(Box<dyn ContainerBackend>),
}

impl Backend {
    /// Backend for a format; `Default` resolves to MP4.
    pub fn for_format(format: OutputFormat) -> Self {
        match format.resolve() {
            OutputFormat::Mp4 | OutputFormat::Default => Self::Mp4(Mp4Writer::new(Brand::Mp4)),
            OutputFormat::M4a => Self::M4a(Mp4Writer::new(Brand::M4a)),
            OutputFormat::Amr => Self::Amr(AmrWriter::new()),
            OutputFormat::Mp3 => Self::Mp3(Mp3Writer::new()),
            OutputFormat::Wav => Self::Wav(WavWriter::new()),
        }
    }

    pub fn custom(backend: Box<dyn ContainerBackend>) -> Self {
        Self::Custom(backend)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Mp4(_) => "mp4",
            Self::M4a(_) => "m4a",
            Self::Amr(_) => "amr",
            Self::Mp3(_) => "mp3",
            Self::Wav(_) => "wav",
            Self::Custom(_) => "custom",
        }
    }

    fn inner(&mut self) -> &mut dyn ContainerBackend {
        match self {
            Self::Mp4(w) | Self::M4a(w) => w,
            Self::Amr(w) => w,
            Self::Mp3(w) => w,
            Self::Wav(w) => w,
            Self::Custom(b) => b.as_mut(),
        }
    }
}

impl ContainerBackend for Backend {
    fn set_data_sink(&mut self, sink: Box<dyn DataSink>) -> MuxResult<()> {
        self.inner().set_data_sink(sink)
    }

    fn set_parameter(&mut self, params: &MuxParameters) -> MuxResult<()> {
        self.inner().set_parameter(params)
    }

    fn add_track(&mut self, track: &TrackDesc) -> MuxResult<i32> {
        self.inner().add_track(track)
    }

    fn start(&mut self) -> MuxResult<()> {
        self.inner().start()
    }

    fn write_sample(&mut self, track_id: i32, sample: &Sample) -> MuxResult<()> {
        self.inner().write_sample(track_id, sample)
    }

    fn update_codec_config(&mut self, track_id: i32, config: &CodecConfig) -> MuxResult<()> {
        self.inner().update_codec_config(track_id, config)
    }

    fn stop(&mut self) -> MuxResult<()> {
        self.inner().stop()
    }
}

/// The sink of a backend, or `InvalidOperation` before `set_data_sink`.
pub(crate) fn sink_mut(sink: &mut Option<Box<dyn DataSink>>) -> MuxResult<&mut Box<dyn DataSink>> {
    sink.as_mut()
        .ok_or_else(|| MuxError::InvalidOperation("No data sink attached".into()))
}

/// Track id as a slot index, or `InvalidParameter`.
pub(crate) fn track_slot(track_id: i32, count: usize) -> MuxResult<usize> {
    usize::try_from(track_id)
        .ok()
        .filter(|&i| i < count)
        .ok_or_else(|| MuxError::InvalidParameter(format!("Unknown backend track {track_id}")))
}

/// Single-track backends accept exactly one audio track.
pub(crate) fn single_track_check(existing: usize, format: &str) -> MuxResult<()> {
    if existing > 0 {
        return Err(MuxError::InvalidOperation(format!(
            "{format} output holds a single track"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_for_format() {
        assert_eq!(Backend::for_format(OutputFormat::Default).name(), "mp4");
        assert_eq!(Backend::for_format(OutputFormat::Mp4).name(), "mp4");
        assert_eq!(Backend::for_format(OutputFormat::M4a).name(), "m4a");
        assert_eq!(Backend::for_format(OutputFormat::Amr).name(), "amr");
        assert_eq!(Backend::for_format(OutputFormat::Mp3).name(), "mp3");
        assert_eq!(Backend::for_format(OutputFormat::Wav).name(), "wav");
    }

    #[test]
    fn test_track_slot() {
        assert_eq!(track_slot(1, 2).unwrap(), 1);
        assert!(matches!(track_slot(2, 2), Err(MuxError::InvalidParameter(_))));
        assert!(matches!(track_slot(-1, 2), Err(MuxError::InvalidParameter(_))));
    }

    #[test]
    fn test_backend_requires_sink() {
        let mut backend = Backend::for_format(OutputFormat::Wav);
        assert!(matches!(backend.start(), Err(MuxError::InvalidOperation(_))));
    }
}
