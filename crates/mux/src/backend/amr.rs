//! AMR storage format writer (RFC 4867 section 5): a magic line followed by
//! the speech frames exactly as produced by the encoder.

use std::io::Write;

use mm_common::{CodecKind, Sample};

use super::{single_track_check, sink_mut, track_slot, ContainerBackend, TrackDesc};
use crate::error::{MuxError, MuxResult};
use crate::normalize::CodecConfig;
use crate::params::MuxParameters;
use crate::sink::DataSink;

pub const AMR_NB_MAGIC: &[u8] = b"#!AMR\n";
pub const AMR_WB_MAGIC: &[u8] = b"#!AMR-WB\n";

#[derive(Default)]
pub struct AmrWriter {
    sink: Option<Box<dyn DataSink>>,
    codec: Option<CodecKind>,
    frames: u64,
}

impl AmrWriter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContainerBackend for AmrWriter {
    fn set_data_sink(&mut self, sink: Box<dyn DataSink>) -> MuxResult<()> {
        self.sink = Some(sink);
        Ok(())
    }

    fn set_parameter(&mut self, _params: &MuxParameters) -> MuxResult<()> {
        Ok(())
    }

    fn add_track(&mut self, track: &TrackDesc) -> MuxResult<i32> {
        single_track_check(self.codec.iter().count(), "AMR")?;
        match track.codec {
            CodecKind::AmrNb | CodecKind::AmrWb => {
                self.codec = Some(track.codec);
                Ok(0)
            }
            other => Err(MuxError::UnsupportedFormat(format!(
                "{} in AMR output",
                other.display_name()
            ))),
        }
    }

    fn start(&mut self) -> MuxResult<()> {
        let magic = match self.codec {
            Some(CodecKind::AmrWb) => AMR_WB_MAGIC,
            Some(_) => AMR_NB_MAGIC,
            None => return Err(MuxError::InvalidOperation("AMR output has no track".into())),
        };
        sink_mut(&mut self.sink)?.write_all(magic)?;
        Ok(())
    }

    fn write_sample(&mut self, track_id: i32, sample: &Sample) -> MuxResult<()> {
        track_slot(track_id, 1)?;
        if !sample.is_empty() {
            sink_mut(&mut self.sink)?.write_all(&sample.data)?;
            self.frames += 1;
        }
        Ok(())
    }

    fn update_codec_config(&mut self, track_id: i32, _config: &CodecConfig) -> MuxResult<()> {
        track_slot(track_id, 1).map(|_| ())
    }

    fn stop(&mut self) -> MuxResult<()> {
        sink_mut(&mut self.sink)?.flush()?;
        tracing::info!(frames = self.frames, "AMR file finalized");
        Ok(())
    }
}
