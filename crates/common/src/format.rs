//! `MediaFormat`: typed key/value description of a track.
//!
//! Track parameters travel as a flat bag of well-known keys rather than a
//! struct per codec, so one description type serves audio, video, cover
//! images, and timed metadata alike. Getters are strict about types, with
//! two widening conversions: `Int` reads as `Long`, and `Int`/`Long` read as
//! `Double`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{FormatError, FormatResult};

/// Well-known format keys.
pub mod keys {
    pub const MIME: &str = "mime";
    pub const SAMPLE_RATE: &str = "sample_rate";
    pub const CHANNEL_COUNT: &str = "channel_count";
    /// Bits per PCM sample (8, 16, 24, 32).
    pub const AUDIO_SAMPLE_FORMAT: &str = "audio_sample_format";
    pub const WIDTH: &str = "width";
    pub const HEIGHT: &str = "height";
    pub const FRAME_RATE: &str = "frame_rate";
    /// B-frame reorder depth, 0..=16.
    pub const VIDEO_DELAY: &str = "video_delay";
    /// Codec configuration (avcC/hvcC record, Annex-B parameter sets, or AudioSpecificConfig).
    pub const CODEC_CONFIG: &str = "codec_config";
    pub const BITRATE: &str = "bitrate";
    pub const COLOR_PRIMARIES: &str = "color_primaries";
    pub const TRANSFER_CHARACTERISTICS: &str = "transfer_characteristics";
    pub const MATRIX_COEFFICIENTS: &str = "matrix_coefficients";
    /// 1 = full range, 0 = limited range.
    pub const RANGE_FLAG: &str = "range_flag";
    /// 1 when the stream carries HDR Vivid (CUVA) metadata.
    pub const HDR_VIVID: &str = "hdr_vivid";
    pub const TIMED_METADATA_KEY: &str = "timed_metadata_key";
    /// Track index of the video track a timed-metadata track describes.
    pub const SRC_TRACK_ID: &str = "src_track_id";
}

/// A single typed format value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FormatValue {
    Int(i32),
    Long(i64),
    Double(f64),
    String(String),
    Buffer(Vec<u8>),
}

impl FormatValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Long(_) => "long",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Buffer(_) => "buffer",
        }
    }
}

/// Key/value description of one elementary stream.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaFormat {
    entries: BTreeMap<String, FormatValue>,
}

impl MediaFormat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a description for the given mime type.
    pub fn with_mime(mime: &str) -> Self {
        let mut format = Self::new();
        format.set_string(keys::MIME, mime);
        format
    }

    /// Audio track description with the mandatory keys filled in.
    pub fn audio(mime: &str, sample_rate: i32, channels: i32) -> Self {
        Self::with_mime(mime)
            .with_int(keys::SAMPLE_RATE, sample_rate)
            .with_int(keys::CHANNEL_COUNT, channels)
    }

    /// Video (or cover image) description with the mandatory keys filled in.
    pub fn video(mime: &str, width: i32, height: i32) -> Self {
        Self::with_mime(mime)
            .with_int(keys::WIDTH, width)
            .with_int(keys::HEIGHT, height)
    }

    pub fn with_int(mut self, key: &str, value: i32) -> Self {
        self.set_int(key, value);
        self
    }

    pub fn with_long(mut self, key: &str, value: i64) -> Self {
        self.set_long(key, value);
        self
    }

    pub fn with_double(mut self, key: &str, value: f64) -> Self {
        self.set_double(key, value);
        self
    }

    pub fn with_string(mut self, key: &str, value: &str) -> Self {
        self.set_string(key, value);
        self
    }

    pub fn with_buffer(mut self, key: &str, value: Vec<u8>) -> Self {
        self.set_buffer(key, value);
        self
    }

    pub fn set_int(&mut self, key: &str, value: i32) -> &mut Self {
        self.entries.insert(key.to_string(), FormatValue::Int(value));
        self
    }

    pub fn set_long(&mut self, key: &str, value: i64) -> &mut Self {
        self.entries.insert(key.to_string(), FormatValue::Long(value));
        self
    }

    pub fn set_double(&mut self, key: &str, value: f64) -> &mut Self {
        self.entries.insert(key.to_string(), FormatValue::Double(value));
        self
    }

    pub fn set_string(&mut self, key: &str, value: &str) -> &mut Self {
        self.entries
            .insert(key.to_string(), FormatValue::String(value.to_string()));
        self
    }

    pub fn set_buffer(&mut self, key: &str, value: Vec<u8>) -> &mut Self {
        self.entries.insert(key.to_string(), FormatValue::Buffer(value));
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<FormatValue> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&FormatValue> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormatValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get_int(&self, key: &str) -> FormatResult<i32> {
        match self.lookup(key)? {
            FormatValue::Int(v) => Ok(*v),
            _ => Err(mismatch(key, "int")),
        }
    }

    pub fn get_long(&self, key: &str) -> FormatResult<i64> {
        match self.lookup(key)? {
            FormatValue::Int(v) => Ok(*v as i64),
            FormatValue::Long(v) => Ok(*v),
            _ => Err(mismatch(key, "long")),
        }
    }

    pub fn get_double(&self, key: &str) -> FormatResult<f64> {
        match self.lookup(key)? {
            FormatValue::Int(v) => Ok(*v as f64),
            FormatValue::Long(v) => Ok(*v as f64),
            FormatValue::Double(v) => Ok(*v),
            _ => Err(mismatch(key, "double")),
        }
    }

    pub fn get_string(&self, key: &str) -> FormatResult<&str> {
        match self.lookup(key)? {
            FormatValue::String(v) => Ok(v.as_str()),
            _ => Err(mismatch(key, "string")),
        }
    }

    pub fn get_buffer(&self, key: &str) -> FormatResult<&[u8]> {
        match self.lookup(key)? {
            FormatValue::Buffer(v) => Ok(v.as_slice()),
            _ => Err(mismatch(key, "buffer")),
        }
    }

    /// Optional lookup: `Ok(None)` when absent, error only on a type mismatch.
    pub fn opt_int(&self, key: &str) -> FormatResult<Option<i32>> {
        if self.contains(key) {
            self.get_int(key).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn opt_double(&self, key: &str) -> FormatResult<Option<f64>> {
        if self.contains(key) {
            self.get_double(key).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn opt_buffer(&self, key: &str) -> FormatResult<Option<&[u8]>> {
        if self.contains(key) {
            self.get_buffer(key).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn mime(&self) -> FormatResult<&str> {
        self.get_string(keys::MIME)
    }

    fn lookup(&self, key: &str) -> FormatResult<&FormatValue> {
        self.entries
            .get(key)
            .ok_or_else(|| FormatError::Missing(key.to_string()))
    }
}

fn mismatch(key: &str, expected: &'static str) -> FormatError {
    FormatError::TypeMismatch {
        key: key.to_string(),
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let format = MediaFormat::video("video/avc", 1280, 720)
            .with_double(keys::FRAME_RATE, 29.97)
            .with_buffer(keys::CODEC_CONFIG, vec![1, 2, 3]);

        assert_eq!(format.mime().unwrap(), "video/avc");
        assert_eq!(format.get_int(keys::WIDTH).unwrap(), 1280);
        assert_eq!(format.get_double(keys::FRAME_RATE).unwrap(), 29.97);
        assert_eq!(format.get_buffer(keys::CODEC_CONFIG).unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn test_missing_key() {
        let format = MediaFormat::with_mime("audio/mpeg");
        assert_eq!(
            format.get_int(keys::SAMPLE_RATE),
            Err(FormatError::Missing("sample_rate".into()))
        );
        assert_eq!(format.opt_int(keys::SAMPLE_RATE), Ok(None));
    }

    #[test]
    fn test_type_mismatch() {
        let format = MediaFormat::new().with_string(keys::WIDTH, "1920");
        assert!(matches!(
            format.get_int(keys::WIDTH),
            Err(FormatError::TypeMismatch { expected: "int", .. })
        ));
        assert!(format.opt_int(keys::WIDTH).is_err());
    }

    #[test]
    fn test_widening() {
        let format = MediaFormat::new()
            .with_int(keys::FRAME_RATE, 30)
            .with_int(keys::BITRATE, 128_000);
        assert_eq!(format.get_double(keys::FRAME_RATE).unwrap(), 30.0);
        assert_eq!(format.get_long(keys::BITRATE).unwrap(), 128_000);
        // No narrowing.
        let format = MediaFormat::new().with_long(keys::WIDTH, 10);
        assert!(format.get_int(keys::WIDTH).is_err());
    }

    #[test]
    fn test_overwrite_and_remove() {
        let mut format = MediaFormat::audio("audio/mp4a-latm", 44_100, 2);
        format.set_int(keys::CHANNEL_COUNT, 1);
        assert_eq!(format.get_int(keys::CHANNEL_COUNT).unwrap(), 1);
        assert!(format.remove(keys::CHANNEL_COUNT).is_some());
        assert!(!format.contains(keys::CHANNEL_COUNT));
        assert_eq!(format.len(), 2);
    }

    #[test]
    fn test_json_roundtrip() {
        let format = MediaFormat::audio("audio/mp4a-latm", 48_000, 2);
        let json = serde_json::to_string(&format).unwrap();
        let parsed: MediaFormat = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, format);
    }
}
