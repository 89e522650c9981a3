//! Session-level parameters buffered by `set_parameter` and applied at start.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{MuxError, MuxResult};

/// Free-form text tags.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetadataTag {
    Title,
    Artist,
    Album,
    AlbumArtist,
    Genre,
    Comment,
    Date,
    Copyright,
    Description,
    Composer,
    Lyrics,
}

impl MetadataTag {
    /// iTunes-style `ilst` item type.
    pub fn ilst_atom(self) -> [u8; 4] {
        match self {
            Self::Title => *b"\xA9nam",
            Self::Artist => *b"\xA9ART",
            Self::Album => *b"\xA9alb",
            Self::AlbumArtist => *b"aART",
            Self::Genre => *b"\xA9gen",
            Self::Comment => *b"\xA9cmt",
            Self::Date => *b"\xA9day",
            Self::Copyright => *b"cprt",
            Self::Description => *b"desc",
            Self::Composer => *b"\xA9wrt",
            Self::Lyrics => *b"\xA9lyr",
        }
    }

    /// ID3v2.4 frame id.
    pub fn id3_frame(self) -> [u8; 4] {
        match self {
            Self::Title => *b"TIT2",
            Self::Artist => *b"TPE1",
            Self::Album => *b"TALB",
            Self::AlbumArtist => *b"TPE2",
            Self::Genre => *b"TCON",
            Self::Comment => *b"COMM",
            Self::Date => *b"TDRC",
            Self::Copyright => *b"TCOP",
            Self::Description => *b"TIT3",
            Self::Composer => *b"TCOM",
            Self::Lyrics => *b"USLT",
        }
    }
}

/// Capture location.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoLocation {
    /// ISO 6709 string as stored in the `©xyz` user-data box, e.g. `+37.7749-122.4194/`.
    pub fn iso6709(&self) -> String {
        format!("{:+08.4}{:+09.4}/", self.latitude, self.longitude)
    }
}

/// Parameters accepted by `MuxSession::set_parameter`.
///
/// Every field is optional; successive calls merge, later values winning.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MuxParameters {
    /// Display rotation in degrees, one of 0/90/180/270.
    pub rotation: Option<i32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Creation time in seconds since the Unix epoch.
    pub creation_time: Option<i64>,
    pub tags: BTreeMap<MetadataTag, String>,
    /// Relocate the movie header before the media data at stop.
    pub fast_start: Option<bool>,
    /// Allow timed-metadata tracks to be added.
    pub enable_timed_metadata: Option<bool>,
}

impl MuxParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rotation(mut self, degrees: i32) -> Self {
        self.rotation = Some(degrees);
        self
    }

    pub fn with_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    pub fn with_creation_time(mut self, unix_secs: i64) -> Self {
        self.creation_time = Some(unix_secs);
        self
    }

    pub fn with_tag(mut self, tag: MetadataTag, value: &str) -> Self {
        self.tags.insert(tag, value.to_string());
        self
    }

    pub fn with_fast_start(mut self, enabled: bool) -> Self {
        self.fast_start = Some(enabled);
        self
    }

    pub fn with_timed_metadata(mut self, enabled: bool) -> Self {
        self.enable_timed_metadata = Some(enabled);
        self
    }

    /// Check every field that is set.
    pub fn validate(&self) -> MuxResult<()> {
        if let Some(rotation) = self.rotation {
            if !matches!(rotation, 0 | 90 | 180 | 270) {
                return Err(MuxError::InvalidData(format!(
                    "Rotation must be 0, 90, 180 or 270 degrees, got {rotation}"
                )));
            }
        }

        match (self.latitude, self.longitude) {
            (None, None) => {}
            (Some(lat), Some(lon)) => {
                if !(-90.0..=90.0).contains(&lat) {
                    return Err(MuxError::InvalidData(format!(
                        "Latitude {lat} outside [-90, 90]"
                    )));
                }
                if !(-180.0..=180.0).contains(&lon) {
                    return Err(MuxError::InvalidData(format!(
                        "Longitude {lon} outside [-180, 180]"
                    )));
                }
            }
            _ => {
                return Err(MuxError::InvalidData(
                    "Latitude and longitude must be set together".into(),
                ));
            }
        }

        if let Some(time) = self.creation_time {
            if time < 0 {
                return Err(MuxError::InvalidData(format!(
                    "Creation time {time} is before the Unix epoch"
                )));
            }
        }

        Ok(())
    }

    /// Overlay every field set in `other`.
    pub fn merge(&mut self, other: &MuxParameters) {
        if other.rotation.is_some() {
            self.rotation = other.rotation;
        }
        if other.latitude.is_some() {
            self.latitude = other.latitude;
            self.longitude = other.longitude;
        }
        if other.creation_time.is_some() {
            self.creation_time = other.creation_time;
        }
        for (tag, value) in &other.tags {
            self.tags.insert(*tag, value.clone());
        }
        if other.fast_start.is_some() {
            self.fast_start = other.fast_start;
        }
        if other.enable_timed_metadata.is_some() {
            self.enable_timed_metadata = other.enable_timed_metadata;
        }
    }

    pub fn location(&self) -> Option<GeoLocation> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoLocation {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }

    pub fn rotation_degrees(&self) -> i32 {
        self.rotation.unwrap_or(0)
    }

    pub fn fast_start_enabled(&self) -> bool {
        self.fast_start.unwrap_or(false)
    }

    pub fn timed_metadata_enabled(&self) -> bool {
        self.enable_timed_metadata.unwrap_or(false)
    }
}
