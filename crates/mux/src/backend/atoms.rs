//! Box writing primitives shared by the ISO-BMFF backend.
//!
//! Boxes whose size is unknown up front are written with [`begin_box`] /
//! [`begin_full_box`], which leave a zero size field behind, and closed with
//! [`end_box`], which seeks back and patches it. `mdat` uses the 64-bit form
//! so the payload may exceed 4 GiB.

use std::io::{Seek, SeekFrom, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use byteorder::{BigEndian, WriteBytesExt};

use crate::error::{MuxError, MuxResult};

/// Seconds between 1904-01-01 (ISO-BMFF epoch) and 1970-01-01.
pub const MP4_EPOCH_OFFSET: u64 = 2_082_844_800;

/// Movie-level timescale (milliseconds).
pub const MOVIE_TIMESCALE: u32 = 1000;

/// Media timescale of video tracks.
pub const VIDEO_TIMESCALE: u32 = 90_000;

/// Media timescale of timed-metadata tracks.
pub const METADATA_TIMESCALE: u32 = 1000;

/// Write a header of known size: 4-byte size + 4-byte type.
pub fn write_box_header<W: Write>(writer: &mut W, box_type: &[u8; 4], size: u32) -> MuxResult<()> {
    writer.write_u32::<BigEndian>(size)?;
    writer.write_all(box_type)?;
    Ok(())
}

/// Write a full box header of known size (adds version and 24-bit flags).
pub fn write_full_box_header<W: Write>(
    writer: &mut W,
    box_type: &[u8; 4],
    size: u32,
    version: u8,
    flags: u32,
) -> MuxResult<()> {
    write_box_header(writer, box_type, size)?;
    write_version_flags(writer, version, flags)
}

pub fn write_version_flags<W: Write>(writer: &mut W, version: u8, flags: u32) -> MuxResult<()> {
    writer.write_u32::<BigEndian>(((version as u32) << 24) | (flags & 0x00FF_FFFF))?;
    Ok(())
}

/// Open a box whose size is patched by [`end_box`]. Returns the position
/// of the size field.
pub fn begin_box<W: Write + Seek>(writer: &mut W, box_type: &[u8; 4]) -> MuxResult<u64> {
    let pos = writer.stream_position()?;
    write_box_header(writer, box_type, 0)?;
    Ok(pos)
}

pub fn begin_full_box<W: Write + Seek>(
    writer: &mut W,
    box_type: &[u8; 4],
    version: u8,
    flags: u32,
) -> MuxResult<u64> {
    let pos = begin_box(writer, box_type)?;
    write_version_flags(writer, version, flags)?;
    Ok(pos)
}

/// Patch the 32-bit size of the box opened at `size_pos`.
pub fn end_box<W: Write + Seek>(writer: &mut W, size_pos: u64) -> MuxResult<()> {
    let current = writer.stream_position()?;
    let size = u32::try_from(current - size_pos).map_err(|_| {
        MuxError::InvalidData(format!(
            "Box at {size_pos} is {} bytes, over the 32-bit limit",
            current - size_pos
        ))
    })?;
    writer.seek(SeekFrom::Start(size_pos))?;
    writer.write_u32::<BigEndian>(size)?;
    writer.seek(SeekFrom::Start(current))?;
    Ok(())
}

/// Open a box with a 64-bit size (`size == 1` + largesize). Returns the
/// position of the box start.
pub fn begin_large_box<W: Write + Seek>(writer: &mut W, box_type: &[u8; 4]) -> MuxResult<u64> {
    let pos = writer.stream_position()?;
    write_box_header(writer, box_type, 1)?;
    writer.write_u64::<BigEndian>(0)?;
    Ok(pos)
}

/// Patch the largesize of the box opened at `box_pos` to end at `end`.
pub fn end_large_box<W: Write + Seek>(writer: &mut W, box_pos: u64, end: u64) -> MuxResult<()> {
    let current = writer.stream_position()?;
    writer.seek(SeekFrom::Start(box_pos + 8))?;
    writer.write_u64::<BigEndian>(end - box_pos)?;
    writer.seek(SeekFrom::Start(current))?;
    Ok(())
}

/// Header length of a large box.
pub const LARGE_BOX_HEADER_LEN: u64 = 16;

pub fn write_fixed_16_16<W: Write>(writer: &mut W, value: f64) -> MuxResult<()> {
    writer.write_i32::<BigEndian>((value * 65536.0).round() as i32)?;
    Ok(())
}

pub fn write_fixed_8_8<W: Write>(writer: &mut W, value: f64) -> MuxResult<()> {
    writer.write_i16::<BigEndian>((value * 256.0).round() as i16)?;
    Ok(())
}

pub fn write_zeros<W: Write>(writer: &mut W, count: usize) -> MuxResult<()> {
    writer.write_all(&vec![0u8; count])?;
    Ok(())
}

/// Write a 3x3 transformation matrix (a, b, u, c, d, v, x, y, w).
pub fn write_matrix<W: Write>(writer: &mut W, matrix: &[i32; 9]) -> MuxResult<()> {
    for value in matrix {
        writer.write_i32::<BigEndian>(*value)?;
    }
    Ok(())
}

/// ISO 639-2/T language code packed into 3x5 bits; invalid input maps to "und".
pub fn encode_language(lang: &str) -> u16 {
    let bytes = lang.as_bytes();
    if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_lowercase) {
        return encode_language("und");
    }
    bytes
        .iter()
        .fold(0u16, |acc, b| (acc << 5) | ((b - 0x60) as u16 & 0x1F))
}

/// Rescale a microsecond timestamp into `timescale` ticks, rounding to nearest.
pub fn us_to_ticks(us: i64, timescale: u32) -> i64 {
    let scaled = us as i128 * timescale as i128;
    let rounded = if scaled >= 0 {
        (scaled + 500_000) / 1_000_000
    } else {
        (scaled - 500_000) / 1_000_000
    };
    rounded.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Rescale between two timescales.
pub fn rescale(ticks: u64, from: u32, to: u32) -> u64 {
    if from == 0 {
        return 0;
    }
    ((ticks as u128 * to as u128 + from as u128 / 2) / from as u128) as u64
}

/// ISO-BMFF timestamp for a Unix time, or for now when unset.
pub fn mp4_time(unix_seconds: Option<i64>) -> u64 {
    let unix = match unix_seconds {
        Some(secs) => secs.max(0) as u64,
        None => SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0),
    };
    MP4_EPOCH_OFFSET + unix
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_write_box_header() {
        let mut buf = Vec::new();
        write_box_header(&mut buf, b"ftyp", 20).unwrap();
        assert_eq!(buf, [0, 0, 0, 20, b'f', b't', b'y', b'p']);
    }

    #[test]
    fn test_write_full_box_header() {
        let mut buf = Vec::new();
        write_full_box_header(&mut buf, b"tkhd", 100, 1, 0x000003).unwrap();
        assert_eq!(buf.len(), 12);
        assert_eq!(&buf[4..8], b"tkhd");
        assert_eq!(&buf[8..12], &[0x01, 0x00, 0x00, 0x03]);
    }

    #[test]
    fn test_nested_boxes_are_patched() {
        let mut cursor = Cursor::new(Vec::new());
        let outer = begin_box(&mut cursor, b"moov").unwrap();
        let inner = begin_full_box(&mut cursor, b"mvhd", 0, 0).unwrap();
        cursor.write_all(&[0xAA; 20]).unwrap();
        end_box(&mut cursor, inner).unwrap();
        end_box(&mut cursor, outer).unwrap();

        let buf = cursor.into_inner();
        assert_eq!(buf.len(), 40);
        assert_eq!(&buf[0..4], &[0, 0, 0, 40]);
        assert_eq!(&buf[8..12], &[0, 0, 0, 32]);
        assert_eq!(&buf[12..16], b"mvhd");
    }

    #[test]
    fn test_large_box() {
        let mut cursor = Cursor::new(Vec::new());
        let pos = begin_large_box(&mut cursor, b"mdat").unwrap();
        cursor.write_all(&[0xBB; 32]).unwrap();
        let end = cursor.stream_position().unwrap();
        end_large_box(&mut cursor, pos, end).unwrap();

        let buf = cursor.into_inner();
        assert_eq!(buf.len(), 48);
        assert_eq!(&buf[0..4], &[0, 0, 0, 1]);
        assert_eq!(&buf[4..8], b"mdat");
        assert_eq!(u64::from_be_bytes(buf[8..16].try_into().unwrap()), 48);
    }

    #[test]
    fn test_fixed_point() {
        let mut buf = Vec::new();
        write_fixed_16_16(&mut buf, 1.0).unwrap();
        write_fixed_8_8(&mut buf, 1.0).unwrap();
        write_fixed_16_16(&mut buf, -1.0).unwrap();
        assert_eq!(buf, [0, 1, 0, 0, 1, 0, 0xFF, 0xFF, 0, 0]);
    }

    #[test]
    fn test_encode_language() {
        assert_eq!(encode_language("und"), 0x55C4);
        assert_eq!(encode_language("eng"), 5575);
        assert_eq!(encode_language("EN"), 0x55C4);
    }

    #[test]
    fn test_us_to_ticks() {
        assert_eq!(us_to_ticks(1_000_000, VIDEO_TIMESCALE), 90_000);
        assert_eq!(us_to_ticks(33_333, VIDEO_TIMESCALE), 3000);
        assert_eq!(us_to_ticks(23_220, 44_100), 1024);
        assert_eq!(us_to_ticks(-1_000, METADATA_TIMESCALE), -1);
    }

    #[test]
    fn test_rescale() {
        assert_eq!(rescale(90_000, VIDEO_TIMESCALE, MOVIE_TIMESCALE), 1000);
        assert_eq!(rescale(44_100, 44_100, MOVIE_TIMESCALE), 1000);
        assert_eq!(rescale(5, 0, MOVIE_TIMESCALE), 0);
    }

    #[test]
    fn test_mp4_time() {
        assert_eq!(mp4_time(Some(0)), MP4_EPOCH_OFFSET);
        assert_eq!(mp4_time(Some(1_704_067_200)), MP4_EPOCH_OFFSET + 1_704_067_200);
        assert!(mp4_time(None) > MP4_EPOCH_OFFSET);
    }
}
