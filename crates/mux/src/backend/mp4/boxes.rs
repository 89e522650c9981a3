//! ISO Base Media File Format structure boxes (ISO/IEC 14496-12): `ftyp`
//! and the complete `moov` tree written at stop.
//!
//! Sample data lives in one `mdat` written progressively by the writer; this
//! module only serializes the tables that index it.

use std::io::{Seek, Write};

use byteorder::{BigEndian, WriteBytesExt};
use mm_common::{CodecKind, ColorInfo};

use crate::backend::atoms::{
    begin_box, begin_full_box, encode_language, end_box, rescale, write_box_header,
    write_fixed_16_16, write_fixed_8_8, write_full_box_header, write_matrix, write_zeros,
    MOVIE_TIMESCALE,
};
use crate::error::{MuxError, MuxResult};
use crate::normalize::{aac, CodecConfig};

/// File type brand set.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Brand {
    /// General ISO-BMFF (`isom`).
    Mp4,
    /// Audio-only iTunes flavour (`M4A `).
    M4a,
}

/// Index entry of one sample already written to `mdat`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SampleInfo {
    /// Absolute file offset of the payload.
    pub offset: u64,
    pub size: u32,
    /// Decode time in media timescale ticks, relative to the track's first sample.
    pub dts: i64,
    /// Filled in once the next sample's decode time is known.
    pub duration: u32,
    /// PTS - DTS in media timescale ticks.
    pub composition_offset: i32,
    pub is_sync: bool,
    pub disposable: bool,
}

/// What a `trak` carries.
#[derive(Clone, Debug, PartialEq)]
pub enum TrackMedia {
    Video {
        codec: CodecKind,
        width: u16,
        height: u16,
    },
    Audio {
        codec: CodecKind,
        sample_rate: u32,
        channels: u16,
    },
    TimedMetadata {
        key: String,
        /// `track_ID` of the described video track.
        source_track_id: u32,
    },
}

impl TrackMedia {
    fn handler(&self) -> (&'static [u8; 4], &'static str) {
        match self {
            Self::Video { .. } => (b"vide", "VideoHandler"),
            Self::Audio { .. } => (b"soun", "SoundHandler"),
            Self::TimedMetadata { .. } => (b"meta", "MetadataHandler"),
        }
    }
}

/// One `trak` to serialize.
#[derive(Clone, Debug)]
pub struct Mp4Track {
    /// 1-based `track_ID`.
    pub track_id: u32,
    pub timescale: u32,
    pub media: TrackMedia,
    pub config: CodecConfig,
    pub avg_bitrate: u32,
    pub samples: Vec<SampleInfo>,
    /// Media time of the first sample after the earliest track started, in
    /// movie timescale; becomes an empty edit.
    pub start_delay: u64,
}

impl Mp4Track {
    /// Sum of sample durations in media timescale.
    pub fn media_duration(&self) -> u64 {
        self.samples.iter().map(|s| s.duration as u64).sum()
    }

    fn movie_duration(&self) -> u64 {
        rescale(self.media_duration(), self.timescale, MOVIE_TIMESCALE) + self.start_delay
    }
}

/// Movie-level inputs of the `moov` writer.
#[derive(Debug)]
pub struct Movie<'a> {
    /// ISO-BMFF epoch seconds.
    pub creation_time: u64,
    /// Display rotation applied to video tracks (0, 90, 180, 270).
    pub rotation: i32,
    pub tracks: &'a [Mp4Track],
    /// Serialized `udta` box, empty for none.
    pub udta: &'a [u8],
    /// Added to every chunk offset (fast start moves `mdat` behind `moov`).
    pub chunk_offset_shift: u64,
}

pub fn write_ftyp<W: Write>(writer: &mut W, brand: Brand) -> MuxResult<()> {
    let (major, minor, compatible): (&[u8; 4], u32, &[&[u8; 4]]) = match brand {
        Brand::Mp4 => (b"isom", 0x200, &[b"isom", b"iso6", b"mp41"]),
        Brand::M4a => (b"M4A ", 0, &[b"M4A ", b"isom", b"mp42"]),
    };
    write_box_header(writer, b"ftyp", 16 + 4 * compatible.len() as u32)?;
    writer.write_all(major)?;
    writer.write_u32::<BigEndian>(minor)?;
    for brand in compatible {
        writer.write_all(*brand)?;
    }
    Ok(())
}

const FIXED_ONE: i32 = 0x0001_0000;
const FIXED_W: i32 = 0x4000_0000;

/// Display matrix for a clockwise rotation.
pub fn rotation_matrix(degrees: i32) -> [i32; 9] {
    match degrees {
        90 => [0, FIXED_ONE, 0, -FIXED_ONE, 0, 0, 0, 0, FIXED_W],
        180 => [-FIXED_ONE, 0, 0, 0, -FIXED_ONE, 0, 0, 0, FIXED_W],
        270 => [0, -FIXED_ONE, 0, FIXED_ONE, 0, 0, 0, 0, FIXED_W],
        _ => [FIXED_ONE, 0, 0, 0, FIXED_ONE, 0, 0, 0, FIXED_W],
    }
}

pub fn write_moov<W: Write + Seek>(writer: &mut W, movie: &Movie<'_>) -> MuxResult<()> {
    let pos = begin_box(writer, b"moov")?;
    write_mvhd(writer, movie)?;
    for track in movie.tracks {
        write_trak(writer, movie, track)?;
    }
    writer.write_all(movie.udta)?;
    end_box(writer, pos)
}

/// Full-box version for a header carrying `time` and `duration`: 1 when
/// either overflows 32 bits.
fn time_version(time: u64, duration: u64) -> u8 {
    u8::from(time > u32::MAX as u64 || duration > u32::MAX as u64)
}

fn write_versioned<W: Write>(writer: &mut W, version: u8, value: u64) -> MuxResult<()> {
    if version == 1 {
        writer.write_u64::<BigEndian>(value)?;
    } else {
        writer.write_u32::<BigEndian>(value as u32)?;
    }
    Ok(())
}

fn write_mvhd<W: Write + Seek>(writer: &mut W, movie: &Movie<'_>) -> MuxResult<()> {
    let duration = movie
        .tracks
        .iter()
        .map(Mp4Track::movie_duration)
        .max()
        .unwrap_or(0);
    let next_track_id = movie.tracks.iter().map(|t| t.track_id).max().unwrap_or(0) + 1;

    let version = time_version(movie.creation_time, duration);
    let pos = begin_full_box(writer, b"mvhd", version, 0)?;
    write_versioned(writer, version, movie.creation_time)?;
    write_versioned(writer, version, movie.creation_time)?;
    writer.write_u32::<BigEndian>(MOVIE_TIMESCALE)?;
    write_versioned(writer, version, duration)?;
    write_fixed_16_16(writer, 1.0)?; // rate
    write_fixed_8_8(writer, 1.0)?; // volume
    write_zeros(writer, 10)?;
    write_matrix(writer, &rotation_matrix(0))?;
    write_zeros(writer, 24)?; // pre_defined
    writer.write_u32::<BigEndian>(next_track_id)?;
    end_box(writer, pos)
}

fn write_trak<W: Write + Seek>(writer: &mut W, movie: &Movie<'_>, track: &Mp4Track) -> MuxResult<()> {
    let pos = begin_box(writer, b"trak")?;
    write_tkhd(writer, movie, track)?;
    if let TrackMedia::TimedMetadata { source_track_id, .. } = &track.media {
        let tref = begin_box(writer, b"tref")?;
        write_box_header(writer, b"cdsc", 12)?;
        writer.write_u32::<BigEndian>(*source_track_id)?;
        end_box(writer, tref)?;
    }
    write_edts(writer, track)?;
    write_mdia(writer, movie, track)?;
    end_box(writer, pos)
}

fn write_tkhd<W: Write + Seek>(writer: &mut W, movie: &Movie<'_>, track: &Mp4Track) -> MuxResult<()> {
    // track_enabled | track_in_movie
    let duration = track.movie_duration();
    let version = time_version(movie.creation_time, duration);
    let pos = begin_full_box(writer, b"tkhd", version, 0x000003)?;
    write_versioned(writer, version, movie.creation_time)?;
    write_versioned(writer, version, movie.creation_time)?;
    writer.write_u32::<BigEndian>(track.track_id)?;
    write_zeros(writer, 4)?;
    write_versioned(writer, version, duration)?;
    write_zeros(writer, 8)?;
    writer.write_i16::<BigEndian>(0)?; // layer
    writer.write_i16::<BigEndian>(0)?; // alternate_group
    let volume = if matches!(track.media, TrackMedia::Audio { .. }) { 1.0 } else { 0.0 };
    write_fixed_8_8(writer, volume)?;
    write_zeros(writer, 2)?;

    match &track.media {
        TrackMedia::Video { width, height, .. } => {
            write_matrix(writer, &rotation_matrix(movie.rotation))?;
            write_fixed_16_16(writer, *width as f64)?;
            write_fixed_16_16(writer, *height as f64)?;
        }
        _ => {
            write_matrix(writer, &rotation_matrix(0))?;
            write_zeros(writer, 8)?;
        }
    }
    end_box(writer, pos)
}

/// Edit list: an empty edit for a late-starting track, then the media from
/// its first composition time.
fn write_edts<W: Write + Seek>(writer: &mut W, track: &Mp4Track) -> MuxResult<()> {
    let media_start = track
        .samples
        .first()
        .map(|s| s.composition_offset.max(0) as i64)
        .unwrap_or(0);
    if track.start_delay == 0 && media_start == 0 {
        return Ok(());
    }

    let mut entries: Vec<(u64, i64)> = Vec::with_capacity(2);
    if track.start_delay > 0 {
        entries.push((track.start_delay, -1));
    }
    let media_duration = track.media_duration().saturating_sub(media_start as u64);
    entries.push((rescale(media_duration, track.timescale, MOVIE_TIMESCALE), media_start));

    let edts = begin_box(writer, b"edts")?;
    let elst = begin_full_box(writer, b"elst", 1, 0)?;
    writer.write_u32::<BigEndian>(entries.len() as u32)?;
    for (duration, media_time) in entries {
        writer.write_u64::<BigEndian>(duration)?;
        writer.write_i64::<BigEndian>(media_time)?;
        writer.write_i16::<BigEndian>(1)?; // media_rate_integer
        writer.write_i16::<BigEndian>(0)?;
    }
    end_box(writer, elst)?;
    end_box(writer, edts)
}

fn write_mdia<W: Write + Seek>(writer: &mut W, movie: &Movie<'_>, track: &Mp4Track) -> MuxResult<()> {
    let pos = begin_box(writer, b"mdia")?;

    let duration = track.media_duration();
    let version = time_version(movie.creation_time, duration);
    let mdhd = begin_full_box(writer, b"mdhd", version, 0)?;
    write_versioned(writer, version, movie.creation_time)?;
    write_versioned(writer, version, movie.creation_time)?;
    writer.write_u32::<BigEndian>(track.timescale)?;
    write_versioned(writer, version, duration)?;
    writer.write_u16::<BigEndian>(encode_language("und"))?;
    writer.write_u16::<BigEndian>(0)?;
    end_box(writer, mdhd)?;

    let (handler_type, name) = track.media.handler();
    write_hdlr(writer, handler_type, name)?;
    write_minf(writer, movie, track)?;
    end_box(writer, pos)
}

/// `hdlr` with a null-terminated name.
pub fn write_hdlr<W: Write + Seek>(writer: &mut W, handler_type: &[u8; 4], name: &str) -> MuxResult<()> {
    let pos = begin_full_box(writer, b"hdlr", 0, 0)?;
    write_zeros(writer, 4)?; // pre_defined
    writer.write_all(handler_type)?;
    write_zeros(writer, 12)?;
    writer.write_all(name.as_bytes())?;
    writer.write_u8(0)?;
    end_box(writer, pos)
}

fn write_minf<W: Write + Seek>(writer: &mut W, movie: &Movie<'_>, track: &Mp4Track) -> MuxResult<()> {
    let pos = begin_box(writer, b"minf")?;
    match track.media {
        TrackMedia::Video { .. } => {
            write_full_box_header(writer, b"vmhd", 20, 0, 0x000001)?;
            writer.write_u16::<BigEndian>(0)?; // graphicsmode
            write_zeros(writer, 6)?; // opcolor
        }
        TrackMedia::Audio { .. } => {
            write_full_box_header(writer, b"smhd", 16, 0, 0)?;
            writer.write_i16::<BigEndian>(0)?; // balance
            write_zeros(writer, 2)?;
        }
        TrackMedia::TimedMetadata { .. } => {
            write_full_box_header(writer, b"nmhd", 12, 0, 0)?;
        }
    }

    let dinf = begin_box(writer, b"dinf")?;
    let dref = begin_full_box(writer, b"dref", 0, 0)?;
    writer.write_u32::<BigEndian>(1)?;
    // self-contained
    write_full_box_header(writer, b"url ", 12, 0, 0x000001)?;
    end_box(writer, dref)?;
    end_box(writer, dinf)?;

    write_stbl(writer, track, movie.chunk_offset_shift)?;
    end_box(writer, pos)
}

pub fn write_stbl<W: Write + Seek>(writer: &mut W, track: &Mp4Track, offset_shift: u64) -> MuxResult<()> {
    let samples = &track.samples;
    let pos = begin_box(writer, b"stbl")?;

    write_stsd(writer, track)?;
    write_stts(writer, samples)?;
    if samples.iter().any(|s| s.composition_offset != 0) {
        write_ctts(writer, samples)?;
    }
    write_stsc(writer, samples)?;
    write_stsz(writer, samples)?;
    write_chunk_offsets(writer, samples, offset_shift)?;
    if matches!(track.media, TrackMedia::Video { .. }) {
        write_stss(writer, samples)?;
    }
    if samples.iter().any(|s| s.disposable) {
        write_sdtp(writer, samples)?;
    }

    end_box(writer, pos)
}

fn write_stsd<W: Write + Seek>(writer: &mut W, track: &Mp4Track) -> MuxResult<()> {
    let pos = begin_full_box(writer, b"stsd", 0, 0)?;
    writer.write_u32::<BigEndian>(1)?;
    match &track.media {
        TrackMedia::Video {
            codec,
            width,
            height,
        } => write_visual_sample_entry(writer, track, *codec, *width, *height)?,
        TrackMedia::Audio {
            codec,
            sample_rate,
            channels,
        } => write_audio_sample_entry(writer, track, *codec, *sample_rate, *channels)?,
        TrackMedia::TimedMetadata { key, .. } => {
            let entry = begin_box(writer, b"mett")?;
            write_zeros(writer, 6)?;
            writer.write_u16::<BigEndian>(1)?; // data_reference_index
            writer.write_u8(0)?; // content_encoding
            writer.write_all(key.as_bytes())?;
            writer.write_u8(0)?;
            end_box(writer, entry)?;
        }
    }
    end_box(writer, pos)
}

fn write_visual_sample_entry<W: Write + Seek>(
    writer: &mut W,
    track: &Mp4Track,
    codec: CodecKind,
    width: u16,
    height: u16,
) -> MuxResult<()> {
    let fourcc = match codec {
        CodecKind::Avc => b"avc1",
        CodecKind::Hevc => b"hvc1",
        CodecKind::Mpeg4Visual => b"mp4v",
        other => {
            return Err(MuxError::UnsupportedFormat(format!(
                "{} video sample entry",
                other.display_name()
            )))
        }
    };

    let entry = begin_box(writer, fourcc)?;
    write_zeros(writer, 6)?;
    writer.write_u16::<BigEndian>(1)?; // data_reference_index
    write_zeros(writer, 16)?; // pre_defined + reserved
    writer.write_u16::<BigEndian>(width)?;
    writer.write_u16::<BigEndian>(height)?;
    writer.write_u32::<BigEndian>(0x0048_0000)?; // 72 dpi
    writer.write_u32::<BigEndian>(0x0048_0000)?;
    write_zeros(writer, 4)?;
    writer.write_u16::<BigEndian>(1)?; // frame_count
    write_zeros(writer, 32)?; // compressorname
    writer.write_u16::<BigEndian>(0x0018)?; // depth
    writer.write_i16::<BigEndian>(-1)?;

    let record = &track.config.extradata;
    match codec {
        CodecKind::Avc | CodecKind::Hevc => {
            if record.is_empty() {
                tracing::warn!(track_id = track.track_id, "No decoder configuration record");
            } else {
                let config_type = if codec == CodecKind::Avc { b"avcC" } else { b"hvcC" };
                let pos = begin_box(writer, config_type)?;
                writer.write_all(record)?;
                end_box(writer, pos)?;
            }
        }
        _ => {
            let dsi = (!record.is_empty()).then_some(record.as_slice());
            write_esds(writer, track.track_id, 0x20, 0x04, dsi, track.avg_bitrate)?;
        }
    }

    if let Some(color) = &track.config.color {
        write_colr(writer, color)?;
    }
    if track.config.hdr_vivid {
        write_cuvv(writer)?;
    }
    end_box(writer, entry)
}

/// `colr` box of type `nclx`.
pub fn write_colr<W: Write + Seek>(writer: &mut W, color: &ColorInfo) -> MuxResult<()> {
    let pos = begin_box(writer, b"colr")?;
    writer.write_all(b"nclx")?;
    writer.write_u16::<BigEndian>(color.primaries as u16)?;
    writer.write_u16::<BigEndian>(color.transfer as u16)?;
    writer.write_u16::<BigEndian>(color.matrix as u16)?;
    writer.write_u8(if color.full_range { 0x80 } else { 0x00 })?;
    end_box(writer, pos)
}

/// CUVA HDR Vivid configuration box.
pub fn write_cuvv<W: Write + Seek>(writer: &mut W) -> MuxResult<()> {
    let pos = begin_box(writer, b"cuvv")?;
    writer.write_u16::<BigEndian>(0x0001)?; // cuva_version_map
    writer.write_u16::<BigEndian>(0x0004)?; // terminal_provide_code
    writer.write_u16::<BigEndian>(0x0005)?; // terminal_provide_oriented_code
    write_zeros(writer, 16)?;
    end_box(writer, pos)
}

fn write_audio_sample_entry<W: Write + Seek>(
    writer: &mut W,
    track: &Mp4Track,
    codec: CodecKind,
    sample_rate: u32,
    channels: u16,
) -> MuxResult<()> {
    let entry = begin_box(writer, b"mp4a")?;
    write_zeros(writer, 6)?;
    writer.write_u16::<BigEndian>(1)?; // data_reference_index
    write_zeros(writer, 8)?;
    writer.write_u16::<BigEndian>(channels)?;
    writer.write_u16::<BigEndian>(16)?; // samplesize
    write_zeros(writer, 4)?;
    writer.write_u32::<BigEndian>(sample_rate.min(u16::MAX as u32) << 16)?;

    match codec {
        CodecKind::Aac => {
            let default_asc;
            let asc = if track.config.extradata.is_empty() {
                default_asc = aac::default_audio_specific_config(sample_rate, channels as u32)?;
                &default_asc[..]
            } else {
                &track.config.extradata[..]
            };
            write_esds(writer, track.track_id, 0x40, 0x05, Some(asc), track.avg_bitrate)?;
        }
        CodecKind::Mp3 => write_esds(writer, track.track_id, 0x6B, 0x05, None, track.avg_bitrate)?,
        other => {
            return Err(MuxError::UnsupportedFormat(format!(
                "{} audio sample entry",
                other.display_name()
            )))
        }
    }
    end_box(writer, entry)
}

/// `esds` with an ES descriptor for `object_type` (0x40 AAC, 0x6B MP3,
/// 0x20 MPEG-4 visual).
fn write_esds<W: Write + Seek>(
    writer: &mut W,
    es_id: u32,
    object_type: u8,
    stream_type: u8,
    dsi: Option<&[u8]>,
    avg_bitrate: u32,
) -> MuxResult<()> {
    let dsi_len = dsi.map_or(0, |d| 1 + descr_length_size(d.len()) + d.len());
    let dec_config_len = 13 + dsi_len;
    let es_len = 3 + 1 + descr_length_size(dec_config_len) + dec_config_len + 3;

    let pos = begin_full_box(writer, b"esds", 0, 0)?;
    writer.write_u8(0x03)?; // ES_DescrTag
    write_descr_length(writer, es_len)?;
    writer.write_u16::<BigEndian>(es_id.min(u16::MAX as u32) as u16)?;
    writer.write_u8(0)?; // flags + stream priority

    writer.write_u8(0x04)?; // DecoderConfigDescrTag
    write_descr_length(writer, dec_config_len)?;
    writer.write_u8(object_type)?;
    writer.write_u8((stream_type << 2) | 0x01)?;
    write_zeros(writer, 3)?; // bufferSizeDB
    writer.write_u32::<BigEndian>(avg_bitrate)?; // maxBitrate
    writer.write_u32::<BigEndian>(avg_bitrate)?;

    if let Some(dsi) = dsi {
        writer.write_u8(0x05)?; // DecSpecificInfoTag
        write_descr_length(writer, dsi.len())?;
        writer.write_all(dsi)?;
    }

    writer.write_u8(0x06)?; // SLConfigDescrTag
    write_descr_length(writer, 1)?;
    writer.write_u8(0x02)?;
    end_box(writer, pos)
}

fn descr_length_size(len: usize) -> usize {
    match len {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        _ => 4,
    }
}

/// Expandable descriptor length (ISO/IEC 14496-1, 8.3.3).
fn write_descr_length<W: Write>(writer: &mut W, len: usize) -> MuxResult<()> {
    let size = descr_length_size(len);
    for i in (0..size).rev() {
        let byte = ((len >> (7 * i)) & 0x7F) as u8;
        writer.write_u8(if i > 0 { byte | 0x80 } else { byte })?;
    }
    Ok(())
}

/// Collapse consecutive equal values into `(count, value)` runs.
fn run_lengths<T: PartialEq + Copy>(values: impl IntoIterator<Item = T>) -> Vec<(u32, T)> {
    let mut runs: Vec<(u32, T)> = Vec::new();
    for value in values {
        match runs.last_mut() {
            Some((count, last)) if *last == value => *count += 1,
            _ => runs.push((1, value)),
        }
    }
    runs
}

fn write_stts<W: Write + Seek>(writer: &mut W, samples: &[SampleInfo]) -> MuxResult<()> {
    let runs = run_lengths(samples.iter().map(|s| s.duration));
    let pos = begin_full_box(writer, b"stts", 0, 0)?;
    writer.write_u32::<BigEndian>(runs.len() as u32)?;
    for (count, duration) in runs {
        writer.write_u32::<BigEndian>(count)?;
        writer.write_u32::<BigEndian>(duration)?;
    }
    end_box(writer, pos)
}

/// Version 1 (signed offsets) only when some offset is negative.
fn write_ctts<W: Write + Seek>(writer: &mut W, samples: &[SampleInfo]) -> MuxResult<()> {
    let runs = run_lengths(samples.iter().map(|s| s.composition_offset));
    let version = u8::from(runs.iter().any(|(_, offset)| *offset < 0));
    let pos = begin_full_box(writer, b"ctts", version, 0)?;
    writer.write_u32::<BigEndian>(runs.len() as u32)?;
    for (count, offset) in runs {
        writer.write_u32::<BigEndian>(count)?;
        writer.write_i32::<BigEndian>(offset)?;
    }
    end_box(writer, pos)
}

/// One sample per chunk.
fn write_stsc<W: Write + Seek>(writer: &mut W, samples: &[SampleInfo]) -> MuxResult<()> {
    let pos = begin_full_box(writer, b"stsc", 0, 0)?;
    if samples.is_empty() {
        writer.write_u32::<BigEndian>(0)?;
    } else {
        writer.write_u32::<BigEndian>(1)?;
        writer.write_u32::<BigEndian>(1)?; // first_chunk
        writer.write_u32::<BigEndian>(1)?; // samples_per_chunk
        writer.write_u32::<BigEndian>(1)?; // sample_description_index
    }
    end_box(writer, pos)
}

fn write_stsz<W: Write + Seek>(writer: &mut W, samples: &[SampleInfo]) -> MuxResult<()> {
    let pos = begin_full_box(writer, b"stsz", 0, 0)?;
    let uniform = samples
        .first()
        .map(|first| first.size)
        .filter(|size| samples.iter().all(|s| s.size == *size));
    match uniform {
        Some(size) => {
            writer.write_u32::<BigEndian>(size)?;
            writer.write_u32::<BigEndian>(samples.len() as u32)?;
        }
        None => {
            writer.write_u32::<BigEndian>(0)?;
            writer.write_u32::<BigEndian>(samples.len() as u32)?;
            for sample in samples {
                writer.write_u32::<BigEndian>(sample.size)?;
            }
        }
    }
    end_box(writer, pos)
}

/// `stco`, or `co64` once any shifted offset exceeds 32 bits.
fn write_chunk_offsets<W: Write + Seek>(writer: &mut W, samples: &[SampleInfo], shift: u64) -> MuxResult<()> {
    let large = samples.iter().any(|s| s.offset + shift > u32::MAX as u64);
    let pos = begin_full_box(writer, if large { b"co64" } else { b"stco" }, 0, 0)?;
    writer.write_u32::<BigEndian>(samples.len() as u32)?;
    for sample in samples {
        let offset = sample.offset + shift;
        if large {
            writer.write_u64::<BigEndian>(offset)?;
        } else {
            writer.write_u32::<BigEndian>(offset as u32)?;
        }
    }
    end_box(writer, pos)
}

fn write_stss<W: Write + Seek>(writer: &mut W, samples: &[SampleInfo]) -> MuxResult<()> {
    let sync: Vec<u32> = samples
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_sync)
        .map(|(i, _)| i as u32 + 1)
        .collect();
    let pos = begin_full_box(writer, b"stss", 0, 0)?;
    writer.write_u32::<BigEndian>(sync.len() as u32)?;
    for number in sync {
        writer.write_u32::<BigEndian>(number)?;
    }
    end_box(writer, pos)
}

/// Independent and disposable samples: one byte per sample.
fn write_sdtp<W: Write + Seek>(writer: &mut W, samples: &[SampleInfo]) -> MuxResult<()> {
    let pos = begin_full_box(writer, b"sdtp", 0, 0)?;
    for sample in samples {
        let depends_on: u8 = if sample.is_sync { 2 } else { 1 };
        let is_depended_on: u8 = if sample.disposable { 2 } else { 0 };
        writer.write_u8((depends_on << 4) | (is_depended_on << 2))?;
    }
    end_box(writer, pos)
}
