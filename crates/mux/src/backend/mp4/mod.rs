//! Progressive ISO-BMFF writer for the MP4 and M4A outputs.
//!
//! Layout: `ftyp`, then one 64-bit `mdat` that grows as samples arrive, then
//! `moov` written at stop. With fast start enabled the finished `mdat` is
//! shifted forward in place and `moov` is written between `ftyp` and `mdat`.
//!
//! Image tracks do not become `trak`s: their first sample is stored as cover
//! art in `udta/meta/ilst/covr`.

pub mod boxes;
pub mod meta;

use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use mm_common::{keys, CodecKind, MediaKind, Sample};

use super::atoms::{
    begin_large_box, end_large_box, mp4_time, us_to_ticks, METADATA_TIMESCALE, MOVIE_TIMESCALE,
    VIDEO_TIMESCALE,
};
use super::{sink_mut, track_slot, ContainerBackend, TrackDesc};
use crate::error::{MuxError, MuxResult};
use crate::normalize::CodecConfig;
use crate::params::MuxParameters;
use crate::sink::DataSink;

pub use boxes::{Brand, Movie, Mp4Track, SampleInfo, TrackMedia};
pub use meta::CoverArt;

/// Copy granularity when relocating `mdat` for fast start.
const RELOCATE_CHUNK: usize = 1 << 20;

/// Default frame duration at 90 kHz when no frame rate is known (30 fps).
const DEFAULT_VIDEO_DURATION: u32 = 3000;

struct TrackState {
    track: Mp4Track,
    first_dts: Option<i64>,
    min_pts_us: Option<i64>,
    /// Duration given to a track's last sample when it has no predecessor.
    default_duration: u32,
    /// `video_delay` frames in ticks, for tracks whose samples carry no dts.
    reorder_shift: Option<i64>,
    /// Presentation times in ticks while decode times are being derived.
    derived_pts: Option<Vec<i64>>,
}

enum Slot {
    Track(TrackState),
    Cover { codec: CodecKind, data: Option<Vec<u8>> },
}

pub struct Mp4Writer {
    brand: Brand,
    sink: Option<Box<dyn DataSink>>,
    params: MuxParameters,
    slots: Vec<Slot>,
    next_track_id: u32,
    mdat_pos: Option<u64>,
}

impl Mp4Writer {
    pub fn new(brand: Brand) -> Self {
        Self {
            brand,
            sink: None,
            params: MuxParameters::default(),
            slots: Vec::new(),
            next_track_id: 1,
            mdat_pos: None,
        }
    }

    pub fn brand(&self) -> Brand {
        self.brand
    }

    fn track_state(&self, desc: &TrackDesc) -> MuxResult<TrackState> {
        let format = &desc.format;
        let avg_bitrate = format.opt_int(keys::BITRATE)?.unwrap_or(0).max(0) as u32;

        let mut reorder_shift = None;
        let (media, timescale, default_duration) = match desc.codec.media_kind() {
            MediaKind::Video => {
                if self.brand == Brand::M4a {
                    return Err(MuxError::UnsupportedFormat("Video track in M4A output".into()));
                }
                let width = format.get_int(keys::WIDTH)?.clamp(0, u16::MAX as i32) as u16;
                let height = format.get_int(keys::HEIGHT)?.clamp(0, u16::MAX as i32) as u16;
                let default_duration = format
                    .opt_double(keys::FRAME_RATE)?
                    .filter(|fps| *fps > 0.0)
                    .map(|fps| (VIDEO_TIMESCALE as f64 / fps).round() as u32)
                    .unwrap_or(DEFAULT_VIDEO_DURATION);
                let delay = format.opt_int(keys::VIDEO_DELAY)?.unwrap_or(0);
                if delay > 0 {
                    reorder_shift = Some(delay as i64 * default_duration as i64);
                }
                let media = TrackMedia::Video {
                    codec: desc.codec,
                    width,
                    height,
                };
                (media, VIDEO_TIMESCALE, default_duration)
            }
            MediaKind::Audio => {
                let sample_rate = format.get_int(keys::SAMPLE_RATE)?.max(1) as u32;
                let channels = format.get_int(keys::CHANNEL_COUNT)?.clamp(0, u16::MAX as i32) as u16;
                let default_duration = if desc.codec == CodecKind::Mp3 { 1152 } else { 1024 };
                let media = TrackMedia::Audio {
                    codec: desc.codec,
                    sample_rate,
                    channels,
                };
                (media, sample_rate, default_duration)
            }
            MediaKind::TimedMetadata => {
                let key = format.get_string(keys::TIMED_METADATA_KEY)?.to_owned();
                let source_track_id = desc
                    .source_track
                    .and_then(|id| usize::try_from(id).ok())
                    .and_then(|i| self.slots.get(i))
                    .and_then(|slot| match slot {
                        Slot::Track(state) if matches!(state.track.media, TrackMedia::Video { .. }) => {
                            Some(state.track.track_id)
                        }
                        _ => None,
                    })
                    .ok_or_else(|| {
                        MuxError::InvalidData("Timed metadata track needs a video source track".into())
                    })?;
                let media = TrackMedia::TimedMetadata {
                    key,
                    source_track_id,
                };
                (media, METADATA_TIMESCALE, 1)
            }
            MediaKind::Image => {
                return Err(MuxError::InvalidOperation("Image tracks are stored as cover art".into()))
            }
        };

        Ok(TrackState {
            track: Mp4Track {
                track_id: self.next_track_id,
                timescale,
                media,
                config: desc.config.clone(),
                avg_bitrate,
                samples: Vec::new(),
                start_delay: 0,
            },
            first_dts: None,
            min_pts_us: None,
            default_duration,
            reorder_shift,
            derived_pts: None,
        })
    }

    fn append_sample(&mut self, slot: usize, sample: &Sample) -> MuxResult<()> {
        let Slot::Track(state) = &mut self.slots[slot] else {
            return Ok(());
        };
        let sink = sink_mut(&mut self.sink)?;
        let track = &mut state.track;
        let timescale = track.timescale;

        let size = u32::try_from(sample.len())
            .map_err(|_| MuxError::InvalidData(format!("Sample of {} bytes", sample.len())))?;
        let is_sync = match track.media {
            TrackMedia::Video { .. } => sample.is_sync(),
            _ => true,
        };

        // A reordering track without decode times: the first sample decides,
        // timing is rebuilt from presentation times at stop.
        if track.samples.is_empty() && state.reorder_shift.is_some() && sample.dts.is_none() {
            tracing::debug!(track_id = track.track_id, "Deriving decode times from video_delay");
            state.derived_pts = Some(Vec::new());
        }
        if let Some(pts) = state.derived_pts.as_mut() {
            pts.push(us_to_ticks(sample.pts, timescale));
            state.min_pts_us = Some(state.min_pts_us.map_or(sample.pts, |min| min.min(sample.pts)));
            let offset = sink.stream_position()?;
            sink.write_all(&sample.data)?;
            track.samples.push(SampleInfo {
                offset,
                size,
                dts: 0,
                duration: 0,
                composition_offset: 0,
                is_sync,
                disposable: sample.is_disposable(),
            });
            return Ok(());
        }

        let dts_ticks = us_to_ticks(sample.decode_time(), timescale);
        let pts_ticks = us_to_ticks(sample.pts, timescale);
        let first_dts = *state.first_dts.get_or_insert(dts_ticks);
        state.min_pts_us = Some(state.min_pts_us.map_or(sample.pts, |min| min.min(sample.pts)));

        let mut dts = dts_ticks - first_dts;
        if let Some(last) = track.samples.last_mut() {
            if dts < last.dts {
                tracing::warn!(
                    track_id = track.track_id,
                    dts,
                    previous = last.dts,
                    "Decode time went backwards, clamping"
                );
                dts = last.dts;
            }
            last.duration = (dts - last.dts).min(u32::MAX as i64) as u32;
        }

        let composition_offset = (pts_ticks - dts_ticks).clamp(i32::MIN as i64, i32::MAX as i64) as i32;

        let offset = sink.stream_position()?;
        sink.write_all(&sample.data)?;

        track.samples.push(SampleInfo {
            offset,
            size,
            dts,
            duration: 0,
            composition_offset,
            is_sync,
            disposable: sample.is_disposable(),
        });
        tracing::trace!(track_id = track.track_id, pts = sample.pts, size, "Sample written to mdat");
        Ok(())
    }

    /// Close out per-track timing and move the tracks out of their slots.
    fn finish_tracks(&mut self) -> (Vec<Mp4Track>, Vec<CoverArt>) {
        let global_start = self
            .slots
            .iter()
            .filter_map(|slot| match slot {
                Slot::Track(state) => state.min_pts_us,
                Slot::Cover { .. } => None,
            })
            .min()
            .unwrap_or(0);

        let mut tracks = Vec::new();
        let mut covers = Vec::new();
        for slot in self.slots.drain(..) {
            match slot {
                Slot::Track(mut state) => {
                    if let (Some(pts), Some(shift)) = (state.derived_pts.take(), state.reorder_shift) {
                        derive_decode_times(&mut state.track.samples, &pts, shift);
                    }
                    let samples = &mut state.track.samples;
                    let len = samples.len();
                    if len > 0 {
                        samples[len - 1].duration = if len > 1 {
                            samples[len - 2].duration
                        } else {
                            state.default_duration
                        };
                    }
                    let delay_us = state.min_pts_us.map_or(0, |pts| pts - global_start);
                    state.track.start_delay = us_to_ticks(delay_us, MOVIE_TIMESCALE).max(0) as u64;
                    tracks.push(state.track);
                }
                Slot::Cover { codec, data } => {
                    if let Some(data) = data {
                        covers.push(CoverArt { codec, data });
                    }
                }
            }
        }
        (tracks, covers)
    }
}

/// Rebuild decode times for samples stored in decode order with only
/// presentation times: the i-th decode time is the i-th smallest
/// presentation time minus `shift`.
fn derive_decode_times(samples: &mut [SampleInfo], pts: &[i64], shift: i64) {
    let mut sorted = pts.to_vec();
    sorted.sort_unstable();
    let Some(&first) = sorted.first() else {
        return;
    };
    let first_dts = first - shift;
    for (i, (sample, pts)) in samples.iter_mut().zip(pts).enumerate() {
        let dts = sorted[i] - shift;
        sample.dts = dts - first_dts;
        sample.composition_offset = (pts - dts).clamp(i32::MIN as i64, i32::MAX as i64) as i32;
        if let Some(next) = sorted.get(i + 1) {
            sample.duration = (next - sorted[i]).min(u32::MAX as i64) as u32;
        }
    }
}

/// Serialize `moov` into memory.
fn serialize_moov(movie: &Movie<'_>) -> MuxResult<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    boxes::write_moov(&mut cursor, movie)?;
    Ok(cursor.into_inner())
}

/// Move the byte range `[start, end)` forward by `by` bytes, back to front.
fn shift_forward<S: Read + Write + Seek + ?Sized>(sink: &mut S, start: u64, end: u64, by: u64) -> MuxResult<()> {
    let mut buf = vec![0u8; RELOCATE_CHUNK];
    let mut pos = end;
    while pos > start {
        let n = (pos - start).min(RELOCATE_CHUNK as u64) as usize;
        pos -= n as u64;
        sink.seek(SeekFrom::Start(pos))?;
        sink.read_exact(&mut buf[..n])?;
        sink.seek(SeekFrom::Start(pos + by))?;
        sink.write_all(&buf[..n])?;
    }
    Ok(())
}

impl ContainerBackend for Mp4Writer {
    fn set_data_sink(&mut self, sink: Box<dyn DataSink>) -> MuxResult<()> {
        self.sink = Some(sink);
        Ok(())
    }

    fn set_parameter(&mut self, params: &MuxParameters) -> MuxResult<()> {
        params.validate()?;
        self.params.merge(params);
        Ok(())
    }

    fn add_track(&mut self, desc: &TrackDesc) -> MuxResult<i32> {
        if self.mdat_pos.is_some() {
            return Err(MuxError::InvalidOperation("Cannot add track after start".into()));
        }
        let slot = if desc.codec.media_kind() == MediaKind::Image {
            Slot::Cover {
                codec: desc.codec,
                data: None,
            }
        } else {
            let state = self.track_state(desc)?;
            self.next_track_id += 1;
            Slot::Track(state)
        };
        self.slots.push(slot);
        let id = (self.slots.len() - 1) as i32;
        tracing::info!(id, codec = ?desc.codec, brand = ?self.brand, "Added track");
        Ok(id)
    }

    fn start(&mut self) -> MuxResult<()> {
        if self.mdat_pos.is_some() {
            return Err(MuxError::InvalidOperation("MP4 writer already started".into()));
        }
        let brand = self.brand;
        let sink = sink_mut(&mut self.sink)?;
        boxes::write_ftyp(sink, brand)?;
        self.mdat_pos = Some(begin_large_box(sink, b"mdat")?);
        tracing::info!(?brand, tracks = self.slots.len(), "MP4 header written");
        Ok(())
    }

    fn write_sample(&mut self, track_id: i32, sample: &Sample) -> MuxResult<()> {
        let slot = track_slot(track_id, self.slots.len())?;
        if self.mdat_pos.is_none() {
            return Err(MuxError::InvalidOperation("MP4 writer not started".into()));
        }
        if sample.is_empty() {
            return Ok(());
        }
        match &mut self.slots[slot] {
            Slot::Cover { data, .. } => {
                if data.is_some() {
                    tracing::warn!(track_id, "Extra cover image ignored");
                } else {
                    *data = Some(sample.data.clone());
                }
                Ok(())
            }
            Slot::Track(_) => self.append_sample(slot, sample),
        }
    }

    fn update_codec_config(&mut self, track_id: i32, config: &CodecConfig) -> MuxResult<()> {
        let slot = track_slot(track_id, self.slots.len())?;
        if let Slot::Track(state) = &mut self.slots[slot] {
            tracing::debug!(
                track_id = state.track.track_id,
                bytes = config.extradata.len(),
                hdr_vivid = config.hdr_vivid,
                "Codec config updated"
            );
            state.track.config = config.clone();
        }
        Ok(())
    }

    fn stop(&mut self) -> MuxResult<()> {
        let mdat_pos = self
            .mdat_pos
            .ok_or_else(|| MuxError::InvalidOperation("MP4 writer not started".into()))?;

        let (tracks, covers) = self.finish_tracks();
        let udta = meta::build_udta(&self.params, &covers)?;
        let creation_time = mp4_time(self.params.creation_time);
        let rotation = self.params.rotation_degrees();
        let fast_start = self.params.fast_start_enabled();
        let movie = |shift: u64| Movie {
            creation_time,
            rotation,
            tracks: &tracks,
            udta: &udta,
            chunk_offset_shift: shift,
        };

        let sink = sink_mut(&mut self.sink)?;
        let mdat_end = sink.seek(SeekFrom::End(0))?;
        end_large_box(sink, mdat_pos, mdat_end)?;

        let moov_len = if fast_start {
            // Offsets grow by the moov size, which may itself grow once
            // (stco -> co64); iterate until stable.
            let mut shift = 0u64;
            let mut moov = serialize_moov(&movie(shift))?;
            for _ in 0..3 {
                if moov.len() as u64 == shift {
                    break;
                }
                shift = moov.len() as u64;
                moov = serialize_moov(&movie(shift))?;
            }
            if moov.len() as u64 != shift {
                return Err(MuxError::Unknown("moov size did not converge for fast start".into()));
            }
            shift_forward(sink.as_mut(), mdat_pos, mdat_end, shift)?;
            sink.seek(SeekFrom::Start(mdat_pos))?;
            sink.write_all(&moov)?;
            sink.seek(SeekFrom::End(0))?;
            moov.len()
        } else {
            let moov = serialize_moov(&movie(0))?;
            sink.write_all(&moov)?;
            moov.len()
        };
        sink.flush()?;
        self.mdat_pos = None;

        tracing::info!(
            tracks = tracks.len(),
            covers = covers.len(),
            mdat_bytes = mdat_end - mdat_pos,
            moov_bytes = moov_len,
            fast_start,
            "MP4 file finalized"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::boxes::tests::{box_size_at, box_type_at, find_fourcc};
    use super::*;
    use crate::normalize::CodecConfig;
    use crate::params::MetadataTag;
    use crate::sink::MemorySink;
    use mm_common::{mime, MediaFormat, SampleFlags};

    fn desc(codec: CodecKind, format: MediaFormat) -> TrackDesc {
        TrackDesc {
            codec,
            format,
            config: CodecConfig::default(),
            source_track: None,
        }
    }

    fn avc_desc() -> TrackDesc {
        let mut desc = desc(CodecKind::Avc, MediaFormat::video(mime::VIDEO_AVC, 640, 480));
        desc.config.extradata = vec![1, 0x42, 0xC0, 0x1E, 0xFF, 0xE0, 0x00];
        desc
    }

    fn aac_desc() -> TrackDesc {
        desc(CodecKind::Aac, MediaFormat::audio(mime::AUDIO_AAC, 48_000, 2))
    }

    fn sync(data: &[u8], pts: i64) -> Sample {
        Sample::new(data.to_vec(), pts, SampleFlags::SYNC_FRAME)
    }

    /// Top-level boxes as (type, offset, size).
    fn top_level(buf: &[u8]) -> Vec<([u8; 4], usize, u64)> {
        let mut out = Vec::new();
        let mut pos = 0;
        while pos + 8 <= buf.len() {
            let mut size = box_size_at(buf, pos) as u64;
            if size == 1 {
                size = u64::from_be_bytes(buf[pos + 8..pos + 16].try_into().unwrap());
            }
            out.push((buf[pos + 4..pos + 8].try_into().unwrap(), pos, size));
            pos += size as usize;
        }
        out
    }

    #[test]
    fn test_mp4_layout_moov_at_end() {
        let sink = MemorySink::new();
        let mut writer = Mp4Writer::new(Brand::Mp4);
        writer.set_data_sink(Box::new(sink.clone())).unwrap();
        let video = writer.add_track(&avc_desc()).unwrap();
        let audio = writer.add_track(&aac_desc()).unwrap();
        writer.start().unwrap();
        writer.write_sample(audio, &sync(&[0xA0; 8], 0)).unwrap();
        writer.write_sample(video, &sync(&[0x00, 0x00, 0x00, 0x01, 0x65], 0)).unwrap();
        writer.write_sample(audio, &sync(&[0xA1; 8], 21_333)).unwrap();
        writer.stop().unwrap();

        let out = sink.contents();
        let boxes = top_level(&out);
        let types: Vec<&[u8; 4]> = boxes.iter().map(|(t, _, _)| t).collect();
        assert_eq!(types, [b"ftyp", b"mdat", b"moov"]);
        // 8 + 5 + 8 payload bytes after the 16-byte large header
        assert_eq!(boxes[1].2, 16 + 21);
        assert_eq!(boxes[2].1 as u64 + boxes[2].2, out.len() as u64);

        let moov = &out[boxes[2].1..];
        let stco = find_fourcc(moov, b"stco").unwrap();
        // first chunk of the video track: after ftyp (28) + mdat header (16) + 8 audio bytes
        assert_eq!(&moov[stco + 12..stco + 16], &(28u32 + 16 + 8).to_be_bytes());
    }

    #[test]
    fn test_fast_start_moves_moov_before_mdat() {
        let sink = MemorySink::new();
        let mut writer = Mp4Writer::new(Brand::Mp4);
        writer.set_data_sink(Box::new(sink.clone())).unwrap();
        let video = writer.add_track(&avc_desc()).unwrap();
        writer
            .set_parameter(&MuxParameters::new().with_fast_start(true))
            .unwrap();
        writer.start().unwrap();
        writer.write_sample(video, &sync(&[0xDE, 0xAD, 0xBE, 0xEF], 0)).unwrap();
        writer.write_sample(video, &sync(&[0xCA, 0xFE], 33_333)).unwrap();
        writer.stop().unwrap();

        let out = sink.contents();
        let boxes = top_level(&out);
        let types: Vec<&[u8; 4]> = boxes.iter().map(|(t, _, _)| t).collect();
        assert_eq!(types, [b"ftyp", b"moov", b"mdat"]);

        let (_, moov_pos, moov_size) = boxes[1];
        let moov = &out[moov_pos..moov_pos + moov_size as usize];
        let stco = find_fourcc(moov, b"stco").unwrap();
        let first = u32::from_be_bytes(moov[stco + 12..stco + 16].try_into().unwrap()) as usize;
        let second = u32::from_be_bytes(moov[stco + 16..stco + 20].try_into().unwrap()) as usize;
        assert_eq!(&out[first..first + 4], &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(&out[second..second + 2], &[0xCA, 0xFE]);
    }

    #[test]
    fn test_m4a_brand_and_cover_art() {
        let sink = MemorySink::new();
        let mut writer = Mp4Writer::new(Brand::M4a);
        writer.set_data_sink(Box::new(sink.clone())).unwrap();
        assert!(matches!(
            writer.add_track(&avc_desc()),
            Err(MuxError::UnsupportedFormat(_))
        ));
        let audio = writer.add_track(&aac_desc()).unwrap();
        let cover = writer
            .add_track(&desc(CodecKind::Jpeg, MediaFormat::video(mime::IMAGE_JPG, 1, 1)))
            .unwrap();
        writer
            .set_parameter(&MuxParameters::new().with_tag(MetadataTag::Artist, "Band"))
            .unwrap();
        writer.start().unwrap();
        writer.write_sample(cover, &sync(&[0xFF, 0xD8, 0xFF, 0xE0], 0)).unwrap();
        writer.write_sample(audio, &sync(&[0x21; 6], 0)).unwrap();
        writer.stop().unwrap();

        let out = sink.contents();
        assert_eq!(box_type_at(&out, 0), b"ftyp");
        assert_eq!(&out[8..12], b"M4A ");
        assert!(find_fourcc(&out, b"covr").is_some());
        assert!(find_fourcc(&out, &[0xA9, b'A', b'R', b'T']).is_some());
        // cover art is not a track
        assert_eq!(out.windows(4).filter(|w| w == b"trak").count(), 1);
    }

    #[test]
    fn test_durations_from_decode_times() {
        let sink = MemorySink::new();
        let mut writer = Mp4Writer::new(Brand::Mp4);
        writer.set_data_sink(Box::new(sink.clone())).unwrap();
        let video = writer.add_track(&avc_desc()).unwrap();
        writer.start().unwrap();
        for (i, pts) in [0i64, 40_000, 80_000].into_iter().enumerate() {
            writer.write_sample(video, &sync(&[i as u8; 3], pts)).unwrap();
        }
        writer.stop().unwrap();

        let out = sink.contents();
        let stts = find_fourcc(&out, b"stts").unwrap();
        // 40 ms at 90 kHz for all three samples (last repeats the previous)
        assert_eq!(&out[stts + 8..stts + 20], &[0, 0, 0, 1, 0, 0, 0, 3, 0, 0, 0x0E, 0x10]);
    }

    #[test]
    fn test_timed_metadata_needs_video_source() {
        let mut writer = Mp4Writer::new(Brand::Mp4);
        let audio = writer.add_track(&aac_desc()).unwrap();
        let meta_format = MediaFormat::with_mime(mime::TIMED_METADATA)
            .with_string(keys::TIMED_METADATA_KEY, "com.example.gyro");
        let mut meta = desc(CodecKind::TimedMetadata, meta_format);
        meta.source_track = Some(audio);
        assert!(matches!(writer.add_track(&meta), Err(MuxError::InvalidData(_))));

        let video = writer.add_track(&avc_desc()).unwrap();
        meta.source_track = Some(video);
        assert_eq!(writer.add_track(&meta).unwrap(), 2);
    }

    #[test]
    fn test_stop_requires_start() {
        let mut writer = Mp4Writer::new(Brand::Mp4);
        writer.set_data_sink(Box::new(MemorySink::new())).unwrap();
        assert!(matches!(writer.stop(), Err(MuxError::InvalidOperation(_))));
    }

    #[test]
    fn test_decode_times_derived_from_video_delay() {
        let sink = MemorySink::new();
        let mut writer = Mp4Writer::new(Brand::Mp4);
        writer.set_data_sink(Box::new(sink.clone())).unwrap();
        let mut reordered = avc_desc();
        reordered.format = reordered
            .format
            .with_int(keys::VIDEO_DELAY, 2)
            .with_double(keys::FRAME_RATE, 30.0);
        let video = writer.add_track(&reordered).unwrap();
        writer.start().unwrap();
        // decode order I P B B, presentation times only
        let frames = [
            (0i64, SampleFlags::SYNC_FRAME),
            (100_000, SampleFlags::empty()),
            (33_333, SampleFlags::empty()),
            (66_667, SampleFlags::empty()),
        ];
        for (i, (pts, flags)) in frames.into_iter().enumerate() {
            writer
                .write_sample(video, &Sample::new(vec![i as u8; 4], pts, flags))
                .unwrap();
        }
        writer.stop().unwrap();

        let out = sink.contents();
        let stts = find_fourcc(&out, b"stts").unwrap();
        // one run: four samples of 3000 ticks
        assert_eq!(&out[stts + 8..stts + 20], &[0, 0, 0, 1, 0, 0, 0, 4, 0, 0, 0x0B, 0xB8]);

        let ctts = find_fourcc(&out, b"ctts").unwrap();
        let entries = u32::from_be_bytes(out[ctts + 8..ctts + 12].try_into().unwrap()) as usize;
        let offsets: Vec<(u32, u32)> = (0..entries)
            .map(|i| {
                let at = ctts + 12 + i * 8;
                (
                    u32::from_be_bytes(out[at..at + 4].try_into().unwrap()),
                    u32::from_be_bytes(out[at + 4..at + 8].try_into().unwrap()),
                )
            })
            .collect();
        assert_eq!(offsets, vec![(1, 6000), (1, 12_000), (2, 3000)]);
    }

    #[test]
    fn test_explicit_decode_times_win_over_video_delay() {
        let sink = MemorySink::new();
        let mut writer = Mp4Writer::new(Brand::Mp4);
        writer.set_data_sink(Box::new(sink.clone())).unwrap();
        let mut reordered = avc_desc();
        reordered.format = reordered
            .format
            .with_int(keys::VIDEO_DELAY, 1)
            .with_double(keys::FRAME_RATE, 30.0);
        let video = writer.add_track(&reordered).unwrap();
        writer.start().unwrap();
        for (pts, dts) in [(33_333i64, 0i64), (66_667, 33_333)] {
            writer
                .write_sample(video, &sync(&[1, 2, 3], pts).with_dts(dts))
                .unwrap();
        }
        writer.stop().unwrap();

        let out = sink.contents();
        let ctts = find_fourcc(&out, b"ctts").unwrap();
        // both samples offset by one frame
        assert_eq!(&out[ctts + 8..ctts + 20], &[0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0x0B, 0xB8]);
    }
}
