//! RIFF/WAVE writer for interleaved PCM.

use std::io::{Seek, SeekFrom, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use mm_common::{keys, CodecKind, Sample};

use super::{single_track_check, sink_mut, track_slot, ContainerBackend, TrackDesc};
use crate::error::{MuxError, MuxResult};
use crate::normalize::CodecConfig;
use crate::params::MuxParameters;
use crate::sink::DataSink;

const WAVE_FORMAT_PCM: u16 = 1;

/// Offset of the RIFF chunk size field.
const RIFF_SIZE_POS: u64 = 4;
/// Offset of the `data` chunk size field.
const DATA_SIZE_POS: u64 = 40;
/// Header length up to the first PCM byte.
const HEADER_LEN: u64 = 44;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct PcmLayout {
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
}

impl PcmLayout {
    fn block_align(&self) -> u16 {
        self.channels * self.bits_per_sample.div_ceil(8)
    }

    fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }
}

#[derive(Default)]
pub struct WavWriter {
    sink: Option<Box<dyn DataSink>>,
    layout: Option<PcmLayout>,
    data_len: u64,
    started: bool,
}

impl WavWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn write_header(&mut self, layout: PcmLayout, data_len: u32) -> MuxResult<()> {
        let sink = sink_mut(&mut self.sink)?;
        sink.seek(SeekFrom::Start(0))?;
        sink.write_all(b"RIFF")?;
        sink.write_u32::<LittleEndian>(data_len.saturating_add(HEADER_LEN as u32 - 8))?;
        sink.write_all(b"WAVE")?;

        sink.write_all(b"fmt ")?;
        sink.write_u32::<LittleEndian>(16)?;
        sink.write_u16::<LittleEndian>(WAVE_FORMAT_PCM)?;
        sink.write_u16::<LittleEndian>(layout.channels)?;
        sink.write_u32::<LittleEndian>(layout.sample_rate)?;
        sink.write_u32::<LittleEndian>(layout.byte_rate())?;
        sink.write_u16::<LittleEndian>(layout.block_align())?;
        sink.write_u16::<LittleEndian>(layout.bits_per_sample)?;

        sink.write_all(b"data")?;
        sink.write_u32::<LittleEndian>(data_len)?;
        Ok(())
    }
}

impl ContainerBackend for WavWriter {
    fn set_data_sink(&mut self, sink: Box<dyn DataSink>) -> MuxResult<()> {
        self.sink = Some(sink);
        Ok(())
    }

    fn set_parameter(&mut self, _params: &MuxParameters) -> MuxResult<()> {
        Ok(())
    }

    fn add_track(&mut self, track: &TrackDesc) -> MuxResult<i32> {
        single_track_check(self.layout.iter().count(), "WAV")?;
        if track.codec != CodecKind::Pcm {
            return Err(MuxError::UnsupportedFormat(format!(
                "{} in WAV output",
                track.codec.display_name()
            )));
        }
        let bits = track.format.opt_int(keys::AUDIO_SAMPLE_FORMAT)?.unwrap_or(16);
        if !matches!(bits, 8 | 16 | 24 | 32) {
            return Err(MuxError::InvalidData(format!("PCM sample size {bits} bits")));
        }
        let sample_rate = track.format.get_int(keys::SAMPLE_RATE)?;
        let channels = track.format.get_int(keys::CHANNEL_COUNT)?;
        self.layout = Some(PcmLayout {
            sample_rate: sample_rate.max(0) as u32,
            channels: channels.clamp(0, u16::MAX as i32) as u16,
            bits_per_sample: bits as u16,
        });
        Ok(0)
    }

    fn start(&mut self) -> MuxResult<()> {
        let layout = self
            .layout
            .ok_or_else(|| MuxError::InvalidOperation("WAV output has no track".into()))?;
        self.write_header(layout, 0)?;
        self.started = true;
        tracing::info!(
            sample_rate = layout.sample_rate,
            channels = layout.channels,
            bits = layout.bits_per_sample,
            "WAV header written"
        );
        Ok(())
    }

    fn write_sample(&mut self, track_id: i32, sample: &Sample) -> MuxResult<()> {
        track_slot(track_id, 1)?;
        if sample.is_empty() {
            return Ok(());
        }
        sink_mut(&mut self.sink)?.write_all(&sample.data)?;
        self.data_len += sample.len() as u64;
        Ok(())
    }

    fn update_codec_config(&mut self, track_id: i32, _config: &CodecConfig) -> MuxResult<()> {
        track_slot(track_id, 1).map(|_| ())
    }

    fn stop(&mut self) -> MuxResult<()> {
        if !self.started {
            return Err(MuxError::InvalidOperation("WAV writer was not started".into()));
        }
        let layout = self
            .layout
            .ok_or_else(|| MuxError::InvalidOperation("WAV output has no track".into()))?;

        let mut data_len = self.data_len;
        if data_len % 2 == 1 {
            // RIFF chunks are word aligned.
            sink_mut(&mut self.sink)?.write_u8(0)?;
            data_len += 1;
        }
        let data_len = u32::try_from(data_len)
            .ok()
            .filter(|len| *len <= u32::MAX - HEADER_LEN as u32)
            .ok_or_else(|| MuxError::InvalidData("WAV data exceeds 4 GiB".into()))?;

        self.write_header(layout, data_len)?;
        let sink = sink_mut(&mut self.sink)?;
        sink.seek(SeekFrom::End(0))?;
        sink.flush()?;
        tracing::info!(bytes = data_len, "WAV file finalized");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use mm_common::{mime, MediaFormat, SampleFlags};

    fn pcm_track(bits: i32) -> TrackDesc {
        TrackDesc {
            codec: CodecKind::Pcm,
            format: MediaFormat::audio(mime::AUDIO_RAW, 48_000, 2)
                .with_int(keys::AUDIO_SAMPLE_FORMAT, bits),
            config: CodecConfig::default(),
            source_track: None,
        }
    }

    #[test]
    fn test_wav_header_and_sizes() {
        let sink = MemorySink::new();
        let mut writer = WavWriter::new();
        writer.set_data_sink(Box::new(sink.clone())).unwrap();
        assert_eq!(writer.add_track(&pcm_track(16)).unwrap(), 0);
        writer.start().unwrap();
        writer
            .write_sample(0, &Sample::new(vec![1, 2, 3, 4], 0, SampleFlags::SYNC_FRAME))
            .unwrap();
        writer
            .write_sample(0, &Sample::new(vec![5, 6, 7, 8], 20, SampleFlags::SYNC_FRAME))
            .unwrap();
        writer.stop().unwrap();

        let out = sink.contents();
        assert_eq!(out.len(), 52);
        assert_eq!(&out[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(out[4..8].try_into().unwrap()), 44);
        assert_eq!(&out[8..16], b"WAVEfmt ");
        // byte rate = 48000 * 2 channels * 2 bytes
        assert_eq!(u32::from_le_bytes(out[28..32].try_into().unwrap()), 192_000);
        assert_eq!(u16::from_le_bytes(out[32..34].try_into().unwrap()), 4);
        assert_eq!(&out[36..40], b"data");
        assert_eq!(u32::from_le_bytes(out[40..44].try_into().unwrap()), 8);
        assert_eq!(&out[44..], &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_wav_odd_payload_is_padded() {
        let sink = MemorySink::new();
        let mut writer = WavWriter::new();
        writer.set_data_sink(Box::new(sink.clone())).unwrap();
        writer.add_track(&pcm_track(8)).unwrap();
        writer.start().unwrap();
        writer
            .write_sample(0, &Sample::new(vec![9, 9, 9], 0, SampleFlags::SYNC_FRAME))
            .unwrap();
        writer.stop().unwrap();

        let out = sink.contents();
        assert_eq!(out.len(), 48);
        assert_eq!(u32::from_le_bytes(out[40..44].try_into().unwrap()), 4);
    }

    #[test]
    fn test_wav_rejects_second_track_and_bad_depth() {
        let mut writer = WavWriter::new();
        assert!(matches!(
            writer.add_track(&pcm_track(12)),
            Err(MuxError::InvalidData(_))
        ));
        writer.add_track(&pcm_track(16)).unwrap();
        assert!(matches!(
            writer.add_track(&pcm_track(16)),
            Err(MuxError::InvalidOperation(_))
        ));
    }
}
