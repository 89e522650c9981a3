//! NAL unit framing helpers: Annex-B scanning, length-prefix validation and
//! conversion, and decoder configuration record helpers.

use crate::error::{MuxError, MuxResult};

/// Width of the length prefix written by [`annexb_to_length_prefixed`].
pub const OUTPUT_LENGTH_SIZE: usize = 4;

/// H.264 NAL unit types used when building `avcC`.
pub const AVC_NAL_SPS: u8 = 7;
pub const AVC_NAL_PPS: u8 = 8;

/// H.265 NAL unit types used when building `hvcC`.
pub const HEVC_NAL_VPS: u8 = 32;
pub const HEVC_NAL_SPS: u8 = 33;
pub const HEVC_NAL_PPS: u8 = 34;
pub const HEVC_NAL_PREFIX_SEI: u8 = 39;

pub fn avc_nal_type(first_byte: u8) -> u8 {
    first_byte & 0x1F
}

pub fn hevc_nal_type(first_byte: u8) -> u8 {
    (first_byte >> 1) & 0x3F
}

/// Read a big-endian NAL length of `width` bytes.
fn read_nal_length(data: &[u8], width: usize) -> usize {
    data[..width]
        .iter()
        .fold(0usize, |acc, &b| (acc << 8) | b as usize)
}

/// Whether `buf` is exactly a sequence of `width`-byte length prefixes each
/// followed by that many bytes, with no NAL shorter than two bytes.
pub fn is_length_prefixed(buf: &[u8], width: usize) -> bool {
    if !(1..=4).contains(&width) || buf.is_empty() {
        return false;
    }
    let mut offset = 0;
    while offset < buf.len() {
        if offset + width > buf.len() {
            return false;
        }
        let len = read_nal_length(&buf[offset..], width);
        offset += width;
        if len <= 1 || len > buf.len() - offset {
            return false;
        }
        offset += len;
    }
    true
}

/// Find the next `00 00 01` at or after `from`.
fn find_start_code(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .windows(3)
        .position(|w| w == [0x00, 0x00, 0x01])
        .map(|p| p + from)
}

/// Split an Annex-B buffer into NAL unit payloads (start codes removed).
///
/// A zero byte directly before `00 00 01` belongs to the 4-byte start code
/// and is not part of the preceding NAL. Bytes before the first start code
/// are ignored.
pub fn split_annexb(buf: &[u8]) -> Vec<&[u8]> {
    let mut nals = Vec::new();
    let Some(mut sc) = find_start_code(buf, 0) else {
        return nals;
    };
    loop {
        let start = sc + 3;
        match find_start_code(buf, start) {
            Some(next) => {
                let end = if next > start && buf[next - 1] == 0 {
                    next - 1
                } else {
                    next
                };
                if end > start {
                    nals.push(&buf[start..end]);
                }
                sc = next;
            }
            None => {
                if start < buf.len() {
                    nals.push(&buf[start..]);
                }
                return nals;
            }
        }
    }
}

/// Rewrite an Annex-B access unit with 4-byte big-endian length prefixes.
pub fn annexb_to_length_prefixed(buf: &[u8]) -> MuxResult<Vec<u8>> {
    let nals = split_annexb(buf);
    if nals.is_empty() {
        return Err(MuxError::InvalidData(
            "Annex-B buffer contains no start code or NAL unit".into(),
        ));
    }
    let payload: usize = nals.iter().map(|n| n.len() + OUTPUT_LENGTH_SIZE).sum();
    let mut out = Vec::with_capacity(payload);
    for nal in nals {
        out.extend_from_slice(&(nal.len() as u32).to_be_bytes());
        out.extend_from_slice(nal);
    }
    Ok(out)
}

/// Iterate the NAL payloads of a length-prefixed buffer.
pub fn split_length_prefixed(buf: &[u8], width: usize) -> Vec<&[u8]> {
    let mut nals = Vec::new();
    let mut offset = 0;
    while offset + width <= buf.len() {
        let len = read_nal_length(&buf[offset..], width);
        offset += width;
        if offset + len > buf.len() {
            break;
        }
        nals.push(&buf[offset..offset + len]);
        offset += len;
    }
    nals
}

/// Byte offset of `lengthSizeMinusOne` inside an `avcC` record.
const AVCC_LENGTH_SIZE_OFFSET: usize = 4;
/// Byte offset of `lengthSizeMinusOne` inside an `hvcC` record.
const HVCC_LENGTH_SIZE_OFFSET: usize = 21;

/// Decoder configuration record flavours that carry a NAL length size.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RecordKind {
    Avc,
    Hevc,
}

impl RecordKind {
    fn length_size_offset(self) -> usize {
        match self {
            Self::Avc => AVCC_LENGTH_SIZE_OFFSET,
            Self::Hevc => HVCC_LENGTH_SIZE_OFFSET,
        }
    }

    /// NAL length size declared by `record`, if it is a version-1 record.
    pub fn length_size(self, record: &[u8]) -> Option<usize> {
        let offset = self.length_size_offset();
        if record.first() != Some(&1) {
            return None;
        }
        record.get(offset).map(|b| (b & 0x03) as usize + 1)
    }

    /// Rewrite the record's `lengthSizeMinusOne` to describe 4-byte prefixes.
    pub fn set_length_size_four(self, record: &mut [u8]) {
        let offset = self.length_size_offset();
        if record.first() == Some(&1) {
            if let Some(byte) = record.get_mut(offset) {
                *byte |= 0x03;
            }
        }
    }
}

/// Build an `AVCDecoderConfigurationRecord` from SPS and PPS NAL units.
pub fn build_avcc(sps: &[&[u8]], pps: &[&[u8]]) -> MuxResult<Vec<u8>> {
    let first = sps
        .first()
        .ok_or_else(|| MuxError::InvalidData("AVC configuration needs an SPS".into()))?;
    if first.len() < 4 {
        return Err(MuxError::InvalidData(format!(
            "AVC SPS too short: {} bytes",
            first.len()
        )));
    }
    if pps.is_empty() {
        return Err(MuxError::InvalidData("AVC configuration needs a PPS".into()));
    }

    let mut out = vec![1, first[1], first[2], first[3], 0xFF];
    out.push(0xE0 | (sps.len().min(31) as u8));
    for nal in sps.iter().take(31) {
        out.extend_from_slice(&(nal.len() as u16).to_be_bytes());
        out.extend_from_slice(nal);
    }
    out.push(pps.len().min(255) as u8);
    for nal in pps.iter().take(255) {
        out.extend_from_slice(&(nal.len() as u16).to_be_bytes());
        out.extend_from_slice(nal);
    }
    Ok(out)
}

/// Extract SPS/PPS from an Annex-B access unit and build `avcC`.
/// Returns `None` when the unit carries no complete parameter set pair.
pub fn avcc_from_annexb(buf: &[u8]) -> Option<Vec<u8>> {
    let nals = split_annexb(buf);
    let sps: Vec<&[u8]> = nals
        .iter()
        .copied()
        .filter(|n| !n.is_empty() && avc_nal_type(n[0]) == AVC_NAL_SPS)
        .collect();
    let pps: Vec<&[u8]> = nals
        .iter()
        .copied()
        .filter(|n| !n.is_empty() && avc_nal_type(n[0]) == AVC_NAL_PPS)
        .collect();
    if sps.is_empty() || pps.is_empty() {
        return None;
    }
    build_avcc(&sps, &pps).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_prefixed_detection() {
        let good = [0, 0, 0, 3, 0x65, 0xAA, 0xBB, 0, 0, 0, 2, 0x41, 0x01];
        assert!(is_length_prefixed(&good, 4));
        // Remainder after the last NAL.
        assert!(!is_length_prefixed(&good[..good.len() - 1], 4));
        // NAL of length 1 is rejected.
        assert!(!is_length_prefixed(&[0, 0, 0, 1, 0x65], 4));
        // NAL of length 0 is rejected.
        assert!(!is_length_prefixed(&[0, 0, 0, 0], 4));
        // Annex-B data is not mistaken for 4-byte prefixes.
        assert!(!is_length_prefixed(&[0, 0, 0, 1, 0x65, 0x88, 0x84], 4));
        assert!(!is_length_prefixed(&[], 4));
        assert!(!is_length_prefixed(&good, 0));
        assert!(!is_length_prefixed(&good, 5));
    }

    #[test]
    fn test_length_prefixed_two_byte_width() {
        let buf = [0, 2, 0x67, 0x42, 0, 3, 0x68, 0xCE, 0x38];
        assert!(is_length_prefixed(&buf, 2));
        assert!(!is_length_prefixed(&buf, 4));
    }

    #[test]
    fn test_split_annexb_mixed_start_codes() {
        let buf = [
            0, 0, 0, 1, 0x67, 0x42, 0x1F, // 4-byte start code
            0, 0, 1, 0x68, 0xCE, // 3-byte start code
            0, 0, 0, 1, 0x65, 0x88, 0x84, 0x00,
        ];
        let nals = split_annexb(&buf);
        assert_eq!(nals.len(), 3);
        assert_eq!(nals[0], &[0x67, 0x42, 0x1F]);
        assert_eq!(nals[1], &[0x68, 0xCE]);
        assert_eq!(nals[2], &[0x65, 0x88, 0x84, 0x00]);
    }

    #[test]
    fn test_annexb_to_length_prefixed() {
        let buf = [0, 0, 0, 1, 0x65, 0xAA, 0, 0, 1, 0x41, 0xBB, 0xCC];
        let out = annexb_to_length_prefixed(&buf).unwrap();
        assert_eq!(
            out,
            vec![0, 0, 0, 2, 0x65, 0xAA, 0, 0, 0, 3, 0x41, 0xBB, 0xCC]
        );
        assert!(is_length_prefixed(&out, 4));
    }

    #[test]
    fn test_annexb_without_start_code_is_invalid() {
        let err = annexb_to_length_prefixed(&[0x65, 0x88, 0x84]).unwrap_err();
        assert!(matches!(err, MuxError::InvalidData(_)));
        assert!(annexb_to_length_prefixed(&[0, 0, 1]).is_err());
    }

    #[test]
    fn test_record_length_size() {
        let mut avcc = vec![1, 0x42, 0xC0, 0x1F, 0xFD, 0xE0, 0];
        assert_eq!(RecordKind::Avc.length_size(&avcc), Some(2));
        RecordKind::Avc.set_length_size_four(&mut avcc);
        assert_eq!(RecordKind::Avc.length_size(&avcc), Some(4));

        let mut hvcc = vec![0u8; 23];
        hvcc[0] = 1;
        hvcc[21] = 0x0C;
        assert_eq!(RecordKind::Hevc.length_size(&hvcc), Some(1));
        RecordKind::Hevc.set_length_size_four(&mut hvcc);
        assert_eq!(hvcc[21], 0x0F);

        assert_eq!(RecordKind::Avc.length_size(&[0, 0, 0, 0, 3]), None);
        assert_eq!(RecordKind::Hevc.length_size(&[1, 2, 3]), None);
    }

    #[test]
    fn test_avcc_from_annexb() {
        let sps = [0x67, 0x42, 0xC0, 0x1F, 0xDA, 0x02];
        let pps = [0x68, 0xCE, 0x38, 0x80];
        let mut au = vec![0, 0, 0, 1];
        au.extend_from_slice(&sps);
        au.extend_from_slice(&[0, 0, 0, 1]);
        au.extend_from_slice(&pps);
        au.extend_from_slice(&[0, 0, 0, 1, 0x65, 0x88]);

        let avcc = avcc_from_annexb(&au).unwrap();
        assert_eq!(&avcc[..6], &[1, 0x42, 0xC0, 0x1F, 0xFF, 0xE1]);
        assert_eq!(&avcc[6..8], &[0, sps.len() as u8]);
        assert_eq!(&avcc[8..8 + sps.len()], &sps);
        let pps_at = 8 + sps.len();
        assert_eq!(avcc[pps_at], 1);
        assert_eq!(&avcc[pps_at + 3..], &pps);
    }

    #[test]
    fn test_avcc_from_annexb_without_parameter_sets() {
        assert!(avcc_from_annexb(&[0, 0, 0, 1, 0x65, 0x88, 0x84]).is_none());
    }

    #[test]
    fn test_split_length_prefixed() {
        let buf = [0, 0, 0, 2, 0x40, 0x01, 0, 0, 0, 3, 0x42, 0x01, 0x02];
        let nals = split_length_prefixed(&buf, 4);
        assert_eq!(nals, vec![&[0x40, 0x01][..], &[0x42, 0x01, 0x02][..]]);
    }
}
