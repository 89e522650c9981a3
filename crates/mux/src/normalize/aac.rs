//! AAC helpers: ADTS header parsing and AudioSpecificConfig construction.

use crate::error::{MuxError, MuxResult};

/// MPEG-4 sampling frequency table (ISO/IEC 14496-3, 1.6.3.4).
pub const SAMPLING_FREQUENCIES: [u32; 13] = [
    96_000, 88_200, 64_000, 48_000, 44_100, 32_000, 24_000, 22_050, 16_000, 12_000, 11_025,
    8_000, 7_350,
];

/// AAC-LC audio object type.
pub const AOT_AAC_LC: u8 = 2;

pub fn sampling_frequency_index(sample_rate: u32) -> Option<u8> {
    SAMPLING_FREQUENCIES
        .iter()
        .position(|&f| f == sample_rate)
        .map(|i| i as u8)
}

/// Two-byte AudioSpecificConfig.
pub fn audio_specific_config(object_type: u8, frequency_index: u8, channel_config: u8) -> [u8; 2] {
    [
        (object_type << 3) | (frequency_index >> 1),
        ((frequency_index & 1) << 7) | ((channel_config & 0x0F) << 3),
    ]
}

/// AAC-LC AudioSpecificConfig for a sample rate and channel count.
pub fn default_audio_specific_config(sample_rate: u32, channels: u32) -> MuxResult<[u8; 2]> {
    let index = sampling_frequency_index(sample_rate).ok_or_else(|| {
        MuxError::UnsupportedFormat(format!("AAC sample rate {sample_rate} Hz"))
    })?;
    Ok(audio_specific_config(AOT_AAC_LC, index, channels.min(7) as u8))
}

/// Fields of an ADTS fixed + variable header that the muxer needs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AdtsHeader {
    pub object_type: u8,
    pub frequency_index: u8,
    pub channel_config: u8,
    pub header_len: usize,
    pub frame_len: usize,
}

impl AdtsHeader {
    pub fn audio_specific_config(&self) -> [u8; 2] {
        audio_specific_config(self.object_type, self.frequency_index, self.channel_config)
    }
}

/// Whether `buf` starts with the 12-bit ADTS syncword.
pub fn has_adts_sync(buf: &[u8]) -> bool {
    buf.len() >= 2 && buf[0] == 0xFF && (buf[1] & 0xF6) == 0xF0
}

pub fn parse_adts_header(buf: &[u8]) -> Option<AdtsHeader> {
    if buf.len() < 7 || !has_adts_sync(buf) {
        return None;
    }
    let protection_absent = buf[1] & 0x01 == 1;
    let profile = (buf[2] >> 6) & 0x03;
    let frequency_index = (buf[2] >> 2) & 0x0F;
    let channel_config = ((buf[2] & 0x01) << 2) | ((buf[3] >> 6) & 0x03);
    let frame_len =
        (((buf[3] & 0x03) as usize) << 11) | ((buf[4] as usize) << 3) | ((buf[5] >> 5) as usize);
    let header_len = if protection_absent { 7 } else { 9 };

    if frequency_index as usize >= SAMPLING_FREQUENCIES.len() || frame_len < header_len {
        return None;
    }
    Some(AdtsHeader {
        object_type: profile + 1,
        frequency_index,
        channel_config,
        header_len,
        frame_len,
    })
}

/// Raw AAC payload of an ADTS frame, or `None` if `buf` is not one.
pub fn strip_adts(buf: &[u8]) -> Option<&[u8]> {
    let header = parse_adts_header(buf)?;
    let end = header.frame_len.min(buf.len());
    Some(&buf[header.header_len..end])
}
