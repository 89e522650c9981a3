//! `mm-common`: Shared types, tables, and errors for the MediaMux engine.
//!
//! This crate is the foundation the muxer crate builds on:
//!
//! - **Codec**: `OutputFormat`, `CodecKind`, `MediaKind` and the static mime table
//! - **Format**: `MediaFormat`, a typed key/value track description
//! - **Sample**: `Sample`, `SampleFlags` (data flowing from producers to the muxer)
//! - **Color**: `ColorDescription`, `ColorInfo` (ISO/IEC 23091-2 code points)
//! - **Config**: `MuxerConfig`, `PushPolicy`
//! - **Errors**: `FormatError` (thiserror-based)

pub mod codec;
pub mod color;
pub mod config;
pub mod error;
pub mod format;
pub mod sample;

// Re-export commonly used items at crate root
pub use codec::{mime, CodecKind, MediaKind, OutputFormat};
pub use color::{ColorDescription, ColorInfo};
pub use config::{MuxerConfig, PushPolicy};
pub use error::{FormatError, FormatResult};
pub use format::{keys, FormatValue, MediaFormat};
pub use sample::{Sample, SampleFlags};
