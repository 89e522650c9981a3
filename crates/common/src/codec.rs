//! Output container formats, codec identities, and the mime lookup table.

use serde::{Deserialize, Serialize};

use crate::error::FormatError;

/// Mime type strings accepted by `MediaFormat::MIME`.
pub mod mime {
    pub const AUDIO_AAC: &str = "audio/mp4a-latm";
    pub const AUDIO_MPEG: &str = "audio/mpeg";
    pub const AUDIO_AMR_NB: &str = "audio/3gpp";
    pub const AUDIO_AMR_WB: &str = "audio/amr-wb";
    pub const AUDIO_RAW: &str = "audio/raw";
    pub const VIDEO_AVC: &str = "video/avc";
    pub const VIDEO_HEVC: &str = "video/hevc";
    pub const VIDEO_MPEG4: &str = "video/mp4v-es";
    pub const IMAGE_JPG: &str = "image/jpeg";
    pub const IMAGE_PNG: &str = "image/png";
    pub const IMAGE_BMP: &str = "image/bmp";
    pub const TIMED_METADATA: &str = "meta/timed-metadata";
}

/// Target container format of a mux session.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Let the muxer pick; resolves to [`OutputFormat::Mp4`].
    #[default]
    Default,
    /// ISO BMFF with video and audio (`isom` brand).
    Mp4,
    /// ISO BMFF audio-only (`M4A ` brand).
    M4a,
    /// AMR storage format (RFC 4867 section 5).
    Amr,
    /// MPEG-1/2 Layer III elementary stream with ID3v2 tags.
    Mp3,
    /// RIFF/WAVE with PCM data.
    Wav,
}

impl OutputFormat {
    /// Map `Default` to the most capable concrete format.
    pub fn resolve(self) -> Self {
        match self {
            Self::Default => Self::Mp4,
            other => other,
        }
    }

    /// Integer code used by the flat C-style API surface.
    pub fn code(self) -> i32 {
        match self {
            Self::Default => 0,
            Self::Mp4 => 2,
            Self::M4a => 6,
            Self::Amr => 8,
            Self::Mp3 => 9,
            Self::Wav => 10,
        }
    }

    pub fn from_code(code: i32) -> Result<Self, FormatError> {
        match code {
            0 => Ok(Self::Default),
            2 => Ok(Self::Mp4),
            6 => Ok(Self::M4a),
            8 => Ok(Self::Amr),
            9 => Ok(Self::Mp3),
            10 => Ok(Self::Wav),
            other => Err(FormatError::UnknownOutputFormat(other)),
        }
    }

    pub fn file_extensions(self) -> &'static [&'static str] {
        match self {
            Self::Default | Self::Mp4 => &["mp4", "m4v"],
            Self::M4a => &["m4a"],
            Self::Amr => &["amr"],
            Self::Mp3 => &["mp3"],
            Self::Wav => &["wav"],
        }
    }
}

/// Broad media category of a track.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    Audio,
    Video,
    /// Still image used as cover art.
    Image,
    TimedMetadata,
}

/// Codec identity resolved from a track's mime type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodecKind {
    Aac,
    Mp3,
    AmrNb,
    AmrWb,
    /// Interleaved little-endian PCM.
    Pcm,
    Avc,
    Hevc,
    Mpeg4Visual,
    Jpeg,
    Png,
    Bmp,
    TimedMetadata,
}

/// Immutable mime ↔ codec table.
static MIME_TABLE: &[(&str, CodecKind)] = &[
    (mime::AUDIO_AAC, CodecKind::Aac),
    (mime::AUDIO_MPEG, CodecKind::Mp3),
    (mime::AUDIO_AMR_NB, CodecKind::AmrNb),
    (mime::AUDIO_AMR_WB, CodecKind::AmrWb),
    (mime::AUDIO_RAW, CodecKind::Pcm),
    (mime::VIDEO_AVC, CodecKind::Avc),
    (mime::VIDEO_HEVC, CodecKind::Hevc),
    (mime::VIDEO_MPEG4, CodecKind::Mpeg4Visual),
    (mime::IMAGE_JPG, CodecKind::Jpeg),
    (mime::IMAGE_PNG, CodecKind::Png),
    (mime::IMAGE_BMP, CodecKind::Bmp),
    (mime::TIMED_METADATA, CodecKind::TimedMetadata),
];

impl CodecKind {
    /// Look up a codec by mime type (case-sensitive, as registered).
    pub fn from_mime(mime: &str) -> Option<Self> {
        MIME_TABLE
            .iter()
            .find(|(m, _)| *m == mime)
            .map(|(_, codec)| *codec)
    }

    pub fn mime(self) -> &'static str {
        MIME_TABLE
            .iter()
            .find(|(_, codec)| *codec == self)
            .map(|(m, _)| *m)
            .unwrap_or("application/octet-stream")
    }

    pub fn media_kind(self) -> MediaKind {
        match self {
            Self::Aac | Self::Mp3 | Self::AmrNb | Self::AmrWb | Self::Pcm => MediaKind::Audio,
            Self::Avc | Self::Hevc | Self::Mpeg4Visual => MediaKind::Video,
            Self::Jpeg | Self::Png | Self::Bmp => MediaKind::Image,
            Self::TimedMetadata => MediaKind::TimedMetadata,
        }
    }

    /// Whether the container stores this codec as length-prefixed NAL units.
    pub fn is_nal_based(self) -> bool {
        matches!(self, Self::Avc | Self::Hevc)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Aac => "AAC",
            Self::Mp3 => "MP3",
            Self::AmrNb => "AMR-NB",
            Self::AmrWb => "AMR-WB",
            Self::Pcm => "PCM",
            Self::Avc => "H.264/AVC",
            Self::Hevc => "H.265/HEVC",
            Self::Mpeg4Visual => "MPEG-4 Visual",
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::Bmp => "BMP",
            Self::TimedMetadata => "Timed metadata",
        }
    }
}
