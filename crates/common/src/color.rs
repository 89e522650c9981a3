//! Video color description (ISO/IEC 23091-2 code points) and HDR signalling.

use serde::{Deserialize, Serialize};

/// Code point meaning "unspecified" for primaries, transfer and matrix.
pub const UNSPECIFIED: u8 = 2;

/// Common colour primaries code points.
pub mod primaries {
    pub const BT709: u8 = 1;
    pub const BT601_625: u8 = 5;
    pub const BT601_525: u8 = 6;
    pub const BT2020: u8 = 9;
    pub const P3D65: u8 = 12;
}

/// Common transfer characteristics code points.
pub mod transfer {
    pub const BT709: u8 = 1;
    pub const LINEAR: u8 = 8;
    pub const SRGB: u8 = 13;
    /// SMPTE ST 2084 (HDR10).
    pub const PQ: u8 = 16;
    /// ARIB STD-B67.
    pub const HLG: u8 = 18;
}

/// Common matrix coefficients code points.
pub mod matrix {
    pub const IDENTITY: u8 = 0;
    pub const BT709: u8 = 1;
    pub const BT601: u8 = 6;
    pub const BT2020_NCL: u8 = 9;
}

/// Partial color description: each field may be known or not.
///
/// Explicit track keys and parser-derived values are each held as a
/// `ColorDescription`; [`ColorDescription::or`] merges them field by field.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorDescription {
    pub primaries: Option<u8>,
    pub transfer: Option<u8>,
    pub matrix: Option<u8>,
    pub full_range: Option<bool>,
}

impl ColorDescription {
    pub fn is_empty(&self) -> bool {
        self.primaries.is_none()
            && self.transfer.is_none()
            && self.matrix.is_none()
            && self.full_range.is_none()
    }

    /// Fill every unknown field of `self` from `fallback`.
    pub fn or(self, fallback: ColorDescription) -> ColorDescription {
        ColorDescription {
            primaries: self.primaries.or(fallback.primaries),
            transfer: self.transfer.or(fallback.transfer),
            matrix: self.matrix.or(fallback.matrix),
            full_range: self.full_range.or(fallback.full_range),
        }
    }

    /// Concrete color info, or `None` when nothing at all is known.
    pub fn resolve(self) -> Option<ColorInfo> {
        if self.is_empty() {
            return None;
        }
        Some(ColorInfo {
            primaries: self.primaries.unwrap_or(UNSPECIFIED),
            transfer: self.transfer.unwrap_or(UNSPECIFIED),
            matrix: self.matrix.unwrap_or(UNSPECIFIED),
            full_range: self.full_range.unwrap_or(false),
        })
    }
}

/// Fully resolved color info as written into an `nclx` colour box.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColorInfo {
    pub primaries: u8,
    pub transfer: u8,
    pub matrix: u8,
    pub full_range: bool,
}

impl ColorInfo {
    /// PQ or HLG transfer.
    pub fn is_hdr_transfer(&self) -> bool {
        matches!(self.transfer, transfer::PQ | transfer::HLG)
    }
}
