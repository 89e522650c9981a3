//! MP3 elementary stream writer with an ID3v2.4 tag carrying the session's
//! text metadata.

use std::io::Write;

use mm_common::{CodecKind, Sample};

use super::{single_track_check, sink_mut, track_slot, ContainerBackend, TrackDesc};
use crate::error::{MuxError, MuxResult};
use crate::normalize::CodecConfig;
use crate::params::{MetadataTag, MuxParameters};
use crate::sink::DataSink;

/// ID3v2 text encoding byte for UTF-8.
const ID3_UTF8: u8 = 3;

/// Largest value a 28-bit synchsafe integer holds.
const SYNCHSAFE_MAX: usize = (1 << 28) - 1;

fn synchsafe(value: usize) -> MuxResult<[u8; 4]> {
    if value > SYNCHSAFE_MAX {
        return Err(MuxError::InvalidData(format!("ID3 size {value} too large")));
    }
    Ok([
        ((value >> 21) & 0x7F) as u8,
        ((value >> 14) & 0x7F) as u8,
        ((value >> 7) & 0x7F) as u8,
        (value & 0x7F) as u8,
    ])
}

/// Body of one ID3v2.4 frame for a tag value.
fn frame_body(tag: MetadataTag, value: &str) -> Vec<u8> {
    let mut body = vec![ID3_UTF8];
    if matches!(tag, MetadataTag::Comment | MetadataTag::Lyrics) {
        // language + empty content descriptor
        body.extend_from_slice(b"und");
        body.push(0);
    }
    body.extend_from_slice(value.as_bytes());
    body
}

/// Complete ID3v2.4 tag, or `None` when there is nothing to write.
pub fn build_id3_tag(params: &MuxParameters) -> MuxResult<Option<Vec<u8>>> {
    if params.tags.is_empty() {
        return Ok(None);
    }
    let mut frames = Vec::new();
    for (tag, value) in &params.tags {
        let body = frame_body(*tag, value);
        frames.extend_from_slice(&tag.id3_frame());
        frames.extend_from_slice(&synchsafe(body.len())?);
        frames.extend_from_slice(&[0, 0]);
        frames.extend_from_slice(&body);
    }

    let mut tag = Vec::with_capacity(10 + frames.len());
    tag.extend_from_slice(b"ID3");
    tag.extend_from_slice(&[4, 0, 0]);
    tag.extend_from_slice(&synchsafe(frames.len())?);
    tag.extend_from_slice(&frames);
    Ok(Some(tag))
}

#[derive(Default)]
pub struct Mp3Writer {
    sink: Option<Box<dyn DataSink>>,
    params: MuxParameters,
    has_track: bool,
    bytes: u64,
}

impl Mp3Writer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContainerBackend for Mp3Writer {
    fn set_data_sink(&mut self, sink: Box<dyn DataSink>) -> MuxResult<()> {
        self.sink = Some(sink);
        Ok(())
    }

    fn set_parameter(&mut self, params: &MuxParameters) -> MuxResult<()> {
        self.params.merge(params);
        Ok(())
    }

    fn add_track(&mut self, track: &TrackDesc) -> MuxResult<i32> {
        single_track_check(usize::from(self.has_track), "MP3")?;
        if track.codec != CodecKind::Mp3 {
            return Err(MuxError::UnsupportedFormat(format!(
                "{} in MP3 output",
                track.codec.display_name()
            )));
        }
        self.has_track = true;
        Ok(0)
    }

    fn start(&mut self) -> MuxResult<()> {
        if !self.has_track {
            return Err(MuxError::InvalidOperation("MP3 output has no track".into()));
        }
        if let Some(tag) = build_id3_tag(&self.params)? {
            sink_mut(&mut self.sink)?.write_all(&tag)?;
            tracing::debug!(bytes = tag.len(), frames = self.params.tags.len(), "ID3v2.4 tag written");
        }
        Ok(())
    }

    fn write_sample(&mut self, track_id: i32, sample: &Sample) -> MuxResult<()> {
        track_slot(track_id, 1)?;
        if !sample.is_empty() {
            sink_mut(&mut self.sink)?.write_all(&sample.data)?;
            self.bytes += sample.len() as u64;
        }
        Ok(())
    }

    fn update_codec_config(&mut self, track_id: i32, _config: &CodecConfig) -> MuxResult<()> {
        track_slot(track_id, 1).map(|_| ())
    }

    fn stop(&mut self) -> MuxResult<()> {
        sink_mut(&mut self.sink)?.flush()?;
        tracing::info!(bytes = self.bytes, "MP3 file finalized");
        Ok(())
    }
}
