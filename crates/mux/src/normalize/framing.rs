//! Per-codec framing strategies driven by [`super::BitstreamNormalizer`].

use mm_common::{CodecKind, ColorDescription, Sample};

use super::aac::{has_adts_sync, parse_adts_header, strip_adts};
use super::nal::{annexb_to_length_prefixed, avcc_from_annexb, is_length_prefixed, RecordKind};
use super::parser::BitstreamParser;
use crate::error::{MuxError, MuxResult};

/// How the first media sample of a track is framed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Framing {
    /// The sample only carries codec configuration; consume it and keep
    /// waiting for the first media frame.
    ConfigOnly,
    /// Payloads are already in container framing.
    Passthrough,
    /// Payloads are rewritten by [`FramingStrategy::transcode_if_needed`].
    Transcode,
}

pub trait FramingStrategy: Send {
    /// Classify the first sample of the track. `config` is the codec
    /// configuration known so far.
    fn detect_framing(&mut self, sample: &Sample, config: Option<&[u8]>) -> MuxResult<Framing>;

    /// Codec configuration derivable from `data`, if any.
    fn extract_config(&mut self, data: &[u8]) -> MuxResult<Option<Vec<u8>>>;

    /// Rewrite a payload into container framing when the track needs it.
    fn transcode_if_needed(&self, data: Vec<u8>) -> MuxResult<Vec<u8>>;

    /// Adjust a configuration record to match the framing chosen for the
    /// payloads.
    fn fix_config(&self, _config: &mut Vec<u8>) {}

    /// Color signalling found in the bitstream.
    fn color(&self) -> ColorDescription {
        ColorDescription::default()
    }

    fn hdr_vivid(&self) -> bool {
        false
    }

    fn is_transcoding(&self) -> bool;
}

/// Build the strategy for a codec.
pub fn strategy_for(
    codec: CodecKind,
    parser: Option<Box<dyn BitstreamParser>>,
) -> Box<dyn FramingStrategy> {
    match codec {
        CodecKind::Avc => Box::new(AvcFraming::default()),
        CodecKind::Hevc => Box::new(HevcFraming::new(parser)),
        CodecKind::Aac => Box::new(AacFraming::default()),
        _ => Box::new(GenericFraming),
    }
}

/// First-frame rules shared by the NAL-based codecs.
///
/// An Annex-B sync frame without `CODEC_DATA` is accepted here; config
/// extraction then requires its in-band parameter sets.
fn detect_nal_framing(kind: RecordKind, sample: &Sample, config: Option<&[u8]>) -> MuxResult<Framing> {
    if sample.is_codec_data() && !sample.is_sync() {
        return Ok(Framing::ConfigOnly);
    }

    let width = config.and_then(|c| kind.length_size(c)).unwrap_or(4);
    if is_length_prefixed(&sample.data, width) {
        if config.is_none() {
            return Err(MuxError::InvalidData(
                "Length-prefixed first frame requires codec_config in the track format".into(),
            ));
        }
        return Ok(Framing::Passthrough);
    }

    if !sample.is_sync() {
        return Err(MuxError::InvalidData(
            "First Annex-B frame must be a sync frame or carry codec data".into(),
        ));
    }
    Ok(Framing::Transcode)
}

#[derive(Debug, Default)]
pub struct AvcFraming {
    transcode: bool,
}

impl FramingStrategy for AvcFraming {
    fn detect_framing(&mut self, sample: &Sample, config: Option<&[u8]>) -> MuxResult<Framing> {
        let framing = detect_nal_framing(RecordKind::Avc, sample, config)?;
        self.transcode = framing == Framing::Transcode;
        Ok(framing)
    }

    fn extract_config(&mut self, data: &[u8]) -> MuxResult<Option<Vec<u8>>> {
        if let Some(avcc) = avcc_from_annexb(data) {
            return Ok(Some(avcc));
        }
        if RecordKind::Avc.length_size(data).is_some() {
            return Ok(Some(data.to_vec()));
        }
        Ok(None)
    }

    fn transcode_if_needed(&self, data: Vec<u8>) -> MuxResult<Vec<u8>> {
        if self.transcode {
            annexb_to_length_prefixed(&data)
        } else {
            Ok(data)
        }
    }

    fn fix_config(&self, config: &mut Vec<u8>) {
        if self.transcode {
            RecordKind::Avc.set_length_size_four(config);
        }
    }

    fn is_transcoding(&self) -> bool {
        self.transcode
    }
}

pub struct HevcFraming {
    transcode: bool,
    parser: Option<Box<dyn BitstreamParser>>,
}

impl HevcFraming {
    pub fn new(parser: Option<Box<dyn BitstreamParser>>) -> Self {
        Self {
            transcode: false,
            parser,
        }
    }

    fn parse(&mut self, data: &[u8]) -> Option<Vec<u8>> {
        let record = self.parser.as_mut()?.parse_extra_data(data);
        (!record.is_empty()).then_some(record)
    }
}

impl FramingStrategy for HevcFraming {
    fn detect_framing(&mut self, sample: &Sample, config: Option<&[u8]>) -> MuxResult<Framing> {
        let framing = detect_nal_framing(RecordKind::Hevc, sample, config)?;
        self.transcode = framing == Framing::Transcode;
        if self.transcode {
            // Populates color and HDR state even when the record is already known.
            self.parse(&sample.data);
        }
        Ok(framing)
    }

    fn extract_config(&mut self, data: &[u8]) -> MuxResult<Option<Vec<u8>>> {
        if let Some(record) = self.parse(data) {
            return Ok(Some(record));
        }
        if data.len() >= 23 && RecordKind::Hevc.length_size(data).is_some() {
            return Ok(Some(data.to_vec()));
        }
        Ok(None)
    }

    fn transcode_if_needed(&self, data: Vec<u8>) -> MuxResult<Vec<u8>> {
        if self.transcode {
            annexb_to_length_prefixed(&data)
        } else {
            Ok(data)
        }
    }

    fn fix_config(&self, config: &mut Vec<u8>) {
        if self.transcode {
            RecordKind::Hevc.set_length_size_four(config);
        }
    }

    fn color(&self) -> ColorDescription {
        self.parser
            .as_ref()
            .map(|p| p.color_description())
            .unwrap_or_default()
    }

    fn hdr_vivid(&self) -> bool {
        self.parser.as_ref().is_some_and(|p| p.is_hdr_vivid())
    }

    fn is_transcoding(&self) -> bool {
        self.transcode
    }
}

/// AAC: raw access units pass through; ADTS input has its headers stripped.
#[derive(Debug, Default)]
pub struct AacFraming {
    strip_adts: bool,
}

impl FramingStrategy for AacFraming {
    fn detect_framing(&mut self, sample: &Sample, _config: Option<&[u8]>) -> MuxResult<Framing> {
        if has_adts_sync(&sample.data) && parse_adts_header(&sample.data).is_some() {
            self.strip_adts = true;
            return Ok(Framing::Transcode);
        }
        if sample.is_codec_data() {
            return Ok(Framing::ConfigOnly);
        }
        Ok(Framing::Passthrough)
    }

    fn extract_config(&mut self, data: &[u8]) -> MuxResult<Option<Vec<u8>>> {
        Ok(parse_adts_header(data).map(|h| h.audio_specific_config().to_vec()))
    }

    fn transcode_if_needed(&self, data: Vec<u8>) -> MuxResult<Vec<u8>> {
        if !self.strip_adts {
            return Ok(data);
        }
        match strip_adts(&data) {
            Some(raw) => Ok(raw.to_vec()),
            None => Ok(data),
        }
    }

    fn is_transcoding(&self) -> bool {
        self.strip_adts
    }
}

/// Codecs stored exactly as submitted.
#[derive(Debug, Default)]
pub struct GenericFraming;

impl FramingStrategy for GenericFraming {
    fn detect_framing(&mut self, sample: &Sample, _config: Option<&[u8]>) -> MuxResult<Framing> {
        if sample.is_codec_data() {
            Ok(Framing::ConfigOnly)
        } else {
            Ok(Framing::Passthrough)
        }
    }

    fn extract_config(&mut self, _data: &[u8]) -> MuxResult<Option<Vec<u8>>> {
        Ok(None)
    }

    fn transcode_if_needed(&self, data: Vec<u8>) -> MuxResult<Vec<u8>> {
        Ok(data)
    }

    fn is_transcoding(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mm_common::SampleFlags;

    fn sample(data: &[u8], flags: SampleFlags) -> Sample {
        Sample::new(data.to_vec(), 0, flags)
    }

    const AVC_IDR_ANNEXB: [u8; 7] = [0, 0, 0, 1, 0x65, 0x88, 0x84];
    const AVC_IDR_LP: [u8; 7] = [0, 0, 0, 3, 0x65, 0x88, 0x84];

    #[test]
    fn test_avc_codec_data_without_sync_is_config_only() {
        let mut avc = AvcFraming::default();
        let s = sample(&[0, 0, 0, 1, 0x67, 0x42, 0xC0, 0x1F], SampleFlags::CODEC_DATA);
        assert_eq!(avc.detect_framing(&s, None).unwrap(), Framing::ConfigOnly);
        assert!(!avc.is_transcoding());
    }

    #[test]
    fn test_avc_annexb_sync_frame_transcodes() {
        let mut avc = AvcFraming::default();
        let s = sample(&AVC_IDR_ANNEXB, SampleFlags::SYNC_FRAME);
        assert_eq!(avc.detect_framing(&s, None).unwrap(), Framing::Transcode);
        let out = avc.transcode_if_needed(s.data).unwrap();
        assert_eq!(out, AVC_IDR_LP.to_vec());
    }

    #[test]
    fn test_avc_annexb_non_sync_first_frame_is_invalid() {
        let mut avc = AvcFraming::default();
        let s = sample(&AVC_IDR_ANNEXB, SampleFlags::empty());
        assert!(matches!(
            avc.detect_framing(&s, None),
            Err(MuxError::InvalidData(_))
        ));
    }

    #[test]
    fn test_avc_length_prefixed_requires_config() {
        let mut avc = AvcFraming::default();
        let s = sample(&AVC_IDR_LP, SampleFlags::SYNC_FRAME);
        assert!(avc.detect_framing(&s, None).is_err());

        let avcc = [1, 0x42, 0xC0, 0x1F, 0xFF, 0xE0, 0];
        assert_eq!(
            avc.detect_framing(&s, Some(&avcc)).unwrap(),
            Framing::Passthrough
        );
        assert_eq!(avc.transcode_if_needed(s.data.clone()).unwrap(), s.data);
    }

    #[test]
    fn test_avc_fix_config_when_transcoding() {
        let mut avc = AvcFraming::default();
        avc.detect_framing(&sample(&AVC_IDR_ANNEXB, SampleFlags::SYNC_FRAME), None)
            .unwrap();
        let mut avcc = vec![1, 0x42, 0xC0, 0x1F, 0xFC, 0xE0, 0];
        avc.fix_config(&mut avcc);
        assert_eq!(avcc[4], 0xFF);
    }

    #[test]
    fn test_aac_adts_detection_and_strip() {
        let mut aac = AacFraming::default();
        // AAC-LC 44.1 kHz stereo, frame length 9.
        let adts = [0xFF, 0xF1, 0x50, 0x80, 0x01, 0x3F, 0xFC, 0xDE, 0xAD];
        let s = sample(&adts, SampleFlags::empty());
        assert_eq!(aac.detect_framing(&s, None).unwrap(), Framing::Transcode);
        assert_eq!(aac.extract_config(&adts).unwrap(), Some(vec![0x12, 0x10]));
        assert_eq!(aac.transcode_if_needed(adts.to_vec()).unwrap(), vec![0xDE, 0xAD]);
    }

    #[test]
    fn test_aac_raw_passthrough() {
        let mut aac = AacFraming::default();
        let s = sample(&[0x21, 0x10, 0x05], SampleFlags::empty());
        assert_eq!(aac.detect_framing(&s, None).unwrap(), Framing::Passthrough);
        let cfg = sample(&[0x12, 0x10], SampleFlags::CODEC_DATA);
        assert_eq!(aac.detect_framing(&cfg, None).unwrap(), Framing::ConfigOnly);
    }

    #[test]
    fn test_generic_passthrough() {
        let mut generic = GenericFraming;
        let s = sample(&[1, 2, 3], SampleFlags::SYNC_FRAME);
        assert_eq!(generic.detect_framing(&s, None).unwrap(), Framing::Passthrough);
        assert_eq!(generic.transcode_if_needed(vec![1, 2, 3]).unwrap(), vec![1, 2, 3]);
    }
}
