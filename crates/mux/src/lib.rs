//! `mm-mux`: multi-track interleaving muxer for the MediaMux engine.
//!
//! Producers hand encoded samples to a [`MuxSession`]; each track's samples
//! are normalized (Annex-B to length-prefixed NAL units, ADTS stripping,
//! codec-config extraction) and queued, and a scheduler thread interleaves
//! the queues in presentation-time order into a container backend.
//!
//! # Architecture
//!
//! - **Session**: `Uninitialized -> Initialized -> Started -> Stopped`
//! - **Bounded queues**: one per track, `Block` or `Fail` when full
//! - **Scheduler**: one `mux-scheduler` thread owns the backend while started
//! - **Backends**: progressive MP4/M4A (moov at end or fast start), AMR, MP3
//!   with ID3v2.4, and PCM WAV, all pure Rust
//!
//! # Usage
//!
//! ```ignore
//! use mm_common::{mime, MediaFormat, OutputFormat, Sample, SampleFlags};
//! use mm_mux::{FileSink, MuxSession};
//!
//! let session = MuxSession::new();
//! session.init(Box::new(FileSink::create("out.mp4")?), OutputFormat::Mp4)?;
//! let video = session.add_track(&MediaFormat::video(mime::VIDEO_AVC, 1920, 1080))?;
//! session.start()?;
//!
//! session.write_sample(video, Sample::new(access_unit, 0, SampleFlags::SYNC_FRAME))?;
//!
//! // Drains the queues, writes moov and flushes the file
//! session.stop()?;
//! ```

pub mod backend;
pub mod error;
pub mod normalize;
pub mod params;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod sink;

// Re-export primary API types
pub use backend::{Backend, ContainerBackend, TrackDesc};
pub use error::{MuxError, MuxResult};
pub use normalize::parser::{BitstreamParser, HevcParser, ParserFactory};
pub use normalize::{BitstreamNormalizer, CodecConfig};
pub use params::{GeoLocation, MetadataTag, MuxParameters};
pub use queue::{BufferSignal, SampleQueue};
pub use registry::SampleQueueProducer;
pub use session::{MuxSession, Phase};
pub use sink::{DataSink, FileSink, MemorySink};
