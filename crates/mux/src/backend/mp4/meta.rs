//! User data (`udta`): ISO-6709 location and iTunes-style `meta/ilst` items
//! including cover art.

use std::io::{Cursor, Seek, Write};

use byteorder::{BigEndian, WriteBytesExt};
use mm_common::CodecKind;

use super::boxes::write_hdlr;
use crate::backend::atoms::{begin_box, begin_full_box, end_box};
use crate::error::MuxResult;
use crate::params::MuxParameters;

/// `data` atom well-known types.
const DATA_TYPE_UTF8: u32 = 1;
const DATA_TYPE_JPEG: u32 = 13;
const DATA_TYPE_PNG: u32 = 14;
const DATA_TYPE_BMP: u32 = 27;

/// Packed language of the `©xyz` string ("und" in the QuickTime layout).
const XYZ_LANGUAGE: u16 = 0x15C7;

/// Cover image attached through an image track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoverArt {
    pub codec: CodecKind,
    pub data: Vec<u8>,
}

impl CoverArt {
    fn data_type(&self) -> u32 {
        match self.codec {
            CodecKind::Png => DATA_TYPE_PNG,
            CodecKind::Bmp => DATA_TYPE_BMP,
            _ => DATA_TYPE_JPEG,
        }
    }
}

fn write_data_item<W: Write + Seek>(writer: &mut W, atom: &[u8; 4], data_type: u32, value: &[u8]) -> MuxResult<()> {
    let item = begin_box(writer, atom)?;
    let data = begin_box(writer, b"data")?;
    writer.write_u32::<BigEndian>(data_type)?;
    writer.write_u32::<BigEndian>(0)?; // locale
    writer.write_all(value)?;
    end_box(writer, data)?;
    end_box(writer, item)
}

/// Serialized `udta`, or an empty vector when there is nothing to store.
pub fn build_udta(params: &MuxParameters, covers: &[CoverArt]) -> MuxResult<Vec<u8>> {
    let location = params.location();
    if location.is_none() && params.tags.is_empty() && covers.is_empty() {
        return Ok(Vec::new());
    }

    let mut writer = Cursor::new(Vec::new());
    let udta = begin_box(&mut writer, b"udta")?;

    if let Some(location) = location {
        let text = location.iso6709();
        let xyz = begin_box(&mut writer, &[0xA9, b'x', b'y', b'z'])?;
        writer.write_u16::<BigEndian>(text.len() as u16)?;
        writer.write_u16::<BigEndian>(XYZ_LANGUAGE)?;
        writer.write_all(text.as_bytes())?;
        end_box(&mut writer, xyz)?;
    }

    if !params.tags.is_empty() || !covers.is_empty() {
        let meta = begin_full_box(&mut writer, b"meta", 0, 0)?;
        write_hdlr(&mut writer, b"mdir", "")?;
        let ilst = begin_box(&mut writer, b"ilst")?;
        for (tag, value) in &params.tags {
            write_data_item(&mut writer, &tag.ilst_atom(), DATA_TYPE_UTF8, value.as_bytes())?;
        }
        if !covers.is_empty() {
            let covr = begin_box(&mut writer, b"covr")?;
            for cover in covers {
                let data = begin_box(&mut writer, b"data")?;
                writer.write_u32::<BigEndian>(cover.data_type())?;
                writer.write_u32::<BigEndian>(0)?;
                writer.write_all(&cover.data)?;
                end_box(&mut writer, data)?;
            }
            end_box(&mut writer, covr)?;
        }
        end_box(&mut writer, ilst)?;
        end_box(&mut writer, meta)?;
    }

    end_box(&mut writer, udta)?;
    Ok(writer.into_inner())
}
