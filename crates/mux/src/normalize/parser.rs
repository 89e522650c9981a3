//! Bitstream parsers that turn in-band parameter sets into a decoder
//! configuration record and expose the stream's color signalling.
//!
//! [`HevcParser`] reads VPS/SPS/PPS from an Annex-B access unit, parses the
//! SPS far enough to reach the VUI `video_signal_type` fields, scans prefix
//! SEI messages for the HDR Vivid (CUVA 005) marker, and assembles an
//! `HEVCDecoderConfigurationRecord` (ISO/IEC 14496-15, 8.3.3.1).

use std::sync::Arc;

use mm_common::{CodecKind, ColorDescription};

use super::bits::{unescape_rbsp, BitReader};
use super::nal::{
    hevc_nal_type, split_annexb, HEVC_NAL_PPS, HEVC_NAL_PREFIX_SEI, HEVC_NAL_SPS, HEVC_NAL_VPS,
};
use crate::error::{MuxError, MuxResult};

/// Capability a track normalizer needs from a codec-specific parser.
pub trait BitstreamParser: Send {
    /// Build a decoder configuration record from the parameter sets in
    /// `data`. Returns an empty vector when none are present.
    fn parse_extra_data(&mut self, data: &[u8]) -> Vec<u8>;

    fn is_hdr_vivid(&self) -> bool;

    /// `Some(true)` for full range, when signalled.
    fn color_range(&self) -> Option<bool>;

    fn color_primaries(&self) -> Option<u8>;

    fn transfer_characteristics(&self) -> Option<u8>;

    fn matrix_coefficients(&self) -> Option<u8>;

    fn color_description(&self) -> ColorDescription {
        ColorDescription {
            primaries: self.color_primaries(),
            transfer: self.transfer_characteristics(),
            matrix: self.matrix_coefficients(),
            full_range: self.color_range(),
        }
    }
}

/// Creates a parser for a codec, or `None` when the codec needs none.
pub type ParserFactory = Arc<dyn Fn(CodecKind) -> Option<Box<dyn BitstreamParser>> + Send + Sync>;

pub fn default_parser_factory() -> ParserFactory {
    Arc::new(|codec| match codec {
        CodecKind::Hevc => Some(Box::new(HevcParser::new()) as Box<dyn BitstreamParser>),
        _ => None,
    })
}

/// ITU-T T.35 identifiers of the CUVA HDR Vivid metadata SEI.
const SEI_USER_DATA_REGISTERED_T35: u32 = 4;
const T35_COUNTRY_CHINA: u8 = 0x26;
const T35_PROVIDER_CUVA: u16 = 0x0004;
const T35_PROVIDER_ORIENTED_HDR_VIVID: u16 = 0x0005;

/// Profile/tier/level fields copied verbatim into `hvcC`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct GeneralPtl {
    /// profile_space(2) | tier_flag(1) | profile_idc(5)
    profile_byte: u8,
    compatibility_flags: u32,
    constraint_flags: u64,
    level_idc: u8,
}

/// SPS fields needed for `hvcC` and color signalling.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct SpsInfo {
    max_sub_layers_minus1: u8,
    temporal_id_nesting: bool,
    ptl: GeneralPtl,
    chroma_format_idc: u8,
    width: u32,
    height: u32,
    bit_depth_luma_minus8: u8,
    bit_depth_chroma_minus8: u8,
    full_range: Option<bool>,
    primaries: Option<u8>,
    transfer: Option<u8>,
    matrix: Option<u8>,
}

#[derive(Debug, Default)]
pub struct HevcParser {
    sps: Option<SpsInfo>,
    hdr_vivid: bool,
}

impl HevcParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Coded picture size from the last parsed SPS.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.sps.as_ref().map(|s| (s.width, s.height))
    }

    fn build_record(sps: &SpsInfo, vps: &[&[u8]], sps_nals: &[&[u8]], pps: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            23 + [vps, sps_nals, pps]
                .iter()
                .flat_map(|a| a.iter())
                .map(|n| n.len() + 2)
                .sum::<usize>()
                + 9,
        );
        out.push(1);
        out.push(sps.ptl.profile_byte);
        out.extend_from_slice(&sps.ptl.compatibility_flags.to_be_bytes());
        out.extend_from_slice(&sps.ptl.constraint_flags.to_be_bytes()[2..]);
        out.push(sps.ptl.level_idc);
        out.extend_from_slice(&0xF000u16.to_be_bytes());
        out.push(0xFC);
        out.push(0xFC | (sps.chroma_format_idc & 0x03));
        out.push(0xF8 | (sps.bit_depth_luma_minus8 & 0x07));
        out.push(0xF8 | (sps.bit_depth_chroma_minus8 & 0x07));
        out.extend_from_slice(&0u16.to_be_bytes());
        let temporal_layers = (sps.max_sub_layers_minus1 + 1) & 0x07;
        out.push((temporal_layers << 3) | ((sps.temporal_id_nesting as u8) << 2) | 0x03);

        let arrays: [(u8, &[&[u8]]); 3] =
            [(HEVC_NAL_VPS, vps), (HEVC_NAL_SPS, sps_nals), (HEVC_NAL_PPS, pps)];
        out.push(arrays.iter().filter(|(_, nals)| !nals.is_empty()).count() as u8);
        for (nal_type, nals) in arrays {
            if nals.is_empty() {
                continue;
            }
            out.push(0x80 | nal_type);
            out.extend_from_slice(&(nals.len() as u16).to_be_bytes());
            for nal in nals {
                out.extend_from_slice(&(nal.len() as u16).to_be_bytes());
                out.extend_from_slice(nal);
            }
        }
        out
    }
}

impl BitstreamParser for HevcParser {
    fn parse_extra_data(&mut self, data: &[u8]) -> Vec<u8> {
        let mut vps = Vec::new();
        let mut sps = Vec::new();
        let mut pps = Vec::new();

        for nal in split_annexb(data) {
            if nal.len() < 2 {
                continue;
            }
            match hevc_nal_type(nal[0]) {
                HEVC_NAL_VPS => vps.push(nal),
                HEVC_NAL_SPS => sps.push(nal),
                HEVC_NAL_PPS => pps.push(nal),
                HEVC_NAL_PREFIX_SEI => {
                    if sei_has_hdr_vivid(&nal[2..]) {
                        self.hdr_vivid = true;
                    }
                }
                _ => {}
            }
        }

        if vps.is_empty() || sps.is_empty() || pps.is_empty() {
            return Vec::new();
        }

        let info = match parse_sps(sps[0]) {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse HEVC SPS");
                return Vec::new();
            }
        };
        tracing::debug!(
            width = info.width,
            height = info.height,
            primaries = ?info.primaries,
            transfer = ?info.transfer,
            hdr_vivid = self.hdr_vivid,
            "Parsed HEVC SPS"
        );
        let record = Self::build_record(&info, &vps, &sps, &pps);
        self.sps = Some(info);
        record
    }

    fn is_hdr_vivid(&self) -> bool {
        self.hdr_vivid
    }

    fn color_range(&self) -> Option<bool> {
        self.sps.as_ref().and_then(|s| s.full_range)
    }

    fn color_primaries(&self) -> Option<u8> {
        self.sps.as_ref().and_then(|s| s.primaries)
    }

    fn transfer_characteristics(&self) -> Option<u8> {
        self.sps.as_ref().and_then(|s| s.transfer)
    }

    fn matrix_coefficients(&self) -> Option<u8> {
        self.sps.as_ref().and_then(|s| s.matrix)
    }
}

fn parse_sps(nal: &[u8]) -> MuxResult<SpsInfo> {
    let rbsp = unescape_rbsp(&nal[2..]);
    let mut r = BitReader::new(&rbsp);
    let mut info = SpsInfo::default();

    r.skip_bits(4)?; // sps_video_parameter_set_id
    info.max_sub_layers_minus1 = r.read_bits(3)? as u8;
    info.temporal_id_nesting = r.read_bit()?;
    info.ptl = parse_profile_tier_level(&mut r, info.max_sub_layers_minus1)?;

    r.read_ue()?; // sps_seq_parameter_set_id
    let chroma_format_idc = r.read_ue()?;
    if chroma_format_idc > 3 {
        return Err(MuxError::InvalidData(format!(
            "HEVC chroma_format_idc {chroma_format_idc}"
        )));
    }
    info.chroma_format_idc = chroma_format_idc as u8;
    if chroma_format_idc == 3 {
        r.skip_bits(1)?; // separate_colour_plane_flag
    }
    info.width = r.read_ue()?;
    info.height = r.read_ue()?;
    if r.read_bit()? {
        for _ in 0..4 {
            r.read_ue()?; // conformance window offsets
        }
    }
    info.bit_depth_luma_minus8 = r.read_ue()?.min(7) as u8;
    info.bit_depth_chroma_minus8 = r.read_ue()?.min(7) as u8;
    let log2_max_poc_lsb = r.read_ue()? + 4;
    if log2_max_poc_lsb > 16 {
        return Err(MuxError::InvalidData(format!(
            "HEVC log2_max_pic_order_cnt_lsb {log2_max_poc_lsb}"
        )));
    }

    let ordering_info_present = r.read_bit()?;
    let first = if ordering_info_present {
        0
    } else {
        info.max_sub_layers_minus1
    };
    for _ in first..=info.max_sub_layers_minus1 {
        r.read_ue()?; // sps_max_dec_pic_buffering_minus1
        r.read_ue()?; // sps_max_num_reorder_pics
        r.read_ue()?; // sps_max_latency_increase_plus1
    }

    for _ in 0..6 {
        // coding/transform block sizes and hierarchy depths
        r.read_ue()?;
    }

    if r.read_bit()? && r.read_bit()? {
        skip_scaling_list_data(&mut r)?;
    }

    r.skip_bits(2)?; // amp_enabled_flag, sample_adaptive_offset_enabled_flag
    if r.read_bit()? {
        // pcm sample bit depths, pcm block sizes, loop filter flag
        r.skip_bits(8)?;
        r.read_ue()?;
        r.read_ue()?;
        r.skip_bits(1)?;
    }

    let num_short_term_ref_pic_sets = r.read_ue()?;
    if num_short_term_ref_pic_sets > 64 {
        return Err(MuxError::InvalidData(format!(
            "HEVC num_short_term_ref_pic_sets {num_short_term_ref_pic_sets}"
        )));
    }
    let mut num_delta_pocs = Vec::with_capacity(num_short_term_ref_pic_sets as usize);
    for idx in 0..num_short_term_ref_pic_sets as usize {
        let count = parse_st_ref_pic_set(&mut r, idx, &num_delta_pocs)?;
        num_delta_pocs.push(count);
    }

    if r.read_bit()? {
        let num_long_term = r.read_ue()?;
        for _ in 0..num_long_term {
            r.skip_bits(log2_max_poc_lsb as usize + 1)?;
        }
    }

    r.skip_bits(2)?; // sps_temporal_mvp_enabled_flag, strong_intra_smoothing_enabled_flag

    if r.read_bit()? {
        parse_vui_signal_type(&mut r, &mut info)?;
    }

    Ok(info)
}

fn parse_profile_tier_level(r: &mut BitReader<'_>, max_sub_layers_minus1: u8) -> MuxResult<GeneralPtl> {
    let ptl = GeneralPtl {
        profile_byte: r.read_bits(8)? as u8,
        compatibility_flags: r.read_bits(32)?,
        constraint_flags: r.read_bits_u64(48)?,
        level_idc: r.read_bits(8)? as u8,
    };

    let mut profile_present = [false; 8];
    let mut level_present = [false; 8];
    for i in 0..max_sub_layers_minus1 as usize {
        profile_present[i] = r.read_bit()?;
        level_present[i] = r.read_bit()?;
    }
    if max_sub_layers_minus1 > 0 {
        for _ in max_sub_layers_minus1..8 {
            r.skip_bits(2)?; // reserved_zero_2bits
        }
    }
    for i in 0..max_sub_layers_minus1 as usize {
        if profile_present[i] {
            r.skip_bits(88)?;
        }
        if level_present[i] {
            r.skip_bits(8)?;
        }
    }
    Ok(ptl)
}

fn skip_scaling_list_data(r: &mut BitReader<'_>) -> MuxResult<()> {
    for size_id in 0..4 {
        let step = if size_id == 3 { 3 } else { 1 };
        let mut matrix_id = 0;
        while matrix_id < 6 {
            if !r.read_bit()? {
                r.read_ue()?; // scaling_list_pred_matrix_id_delta
            } else {
                let coef_num = 64.min(1 << (4 + (size_id << 1)));
                if size_id > 1 {
                    r.read_se()?; // scaling_list_dc_coef_minus8
                }
                for _ in 0..coef_num {
                    r.read_se()?; // scaling_list_delta_coef
                }
            }
            matrix_id += step;
        }
    }
    Ok(())
}

/// Parse one `st_ref_pic_set(idx)` and return its NumDeltaPocs.
fn parse_st_ref_pic_set(r: &mut BitReader<'_>, idx: usize, num_delta_pocs: &[u32]) -> MuxResult<u32> {
    let inter_rps_pred = idx != 0 && r.read_bit()?;
    if inter_rps_pred {
        // delta_idx_minus1 is only coded in slice headers, so it is 0 here.
        let ref_idx = idx - 1;
        r.skip_bits(1)?; // delta_rps_sign
        r.read_ue()?; // abs_delta_rps_minus1
        let ref_count = num_delta_pocs.get(ref_idx).copied().ok_or_else(|| {
            MuxError::InvalidData("HEVC short-term RPS references a missing set".into())
        })?;
        let mut count = 0;
        for _ in 0..=ref_count {
            let used_by_curr_pic = r.read_bit()?;
            let use_delta = used_by_curr_pic || r.read_bit()?;
            if use_delta {
                count += 1;
            }
        }
        Ok(count)
    } else {
        let num_negative = r.read_ue()?;
        let num_positive = r.read_ue()?;
        if num_negative > 16 || num_positive > 16 {
            return Err(MuxError::InvalidData("HEVC short-term RPS too large".into()));
        }
        for _ in 0..num_negative + num_positive {
            r.read_ue()?; // delta_poc_sX_minus1
            r.skip_bits(1)?; // used_by_curr_pic_sX_flag
        }
        Ok(num_negative + num_positive)
    }
}

fn parse_vui_signal_type(r: &mut BitReader<'_>, info: &mut SpsInfo) -> MuxResult<()> {
    if r.read_bit()? {
        let aspect_ratio_idc = r.read_bits(8)?;
        if aspect_ratio_idc == 255 {
            r.skip_bits(32)?; // sar_width, sar_height
        }
    }
    if r.read_bit()? {
        r.skip_bits(1)?; // overscan_appropriate_flag
    }
    if r.read_bit()? {
        r.skip_bits(3)?; // video_format
        info.full_range = Some(r.read_bit()?);
        if r.read_bit()? {
            info.primaries = Some(r.read_bits(8)? as u8);
            info.transfer = Some(r.read_bits(8)? as u8);
            info.matrix = Some(r.read_bits(8)? as u8);
        }
    }
    Ok(())
}

/// Scan the SEI messages of a prefix SEI NAL payload (after the NAL header).
fn sei_has_hdr_vivid(payload: &[u8]) -> bool {
    let rbsp = unescape_rbsp(payload);
    let mut pos = 0;
    while pos < rbsp.len() && rbsp[pos] != 0x80 {
        let Some((payload_type, next)) = read_sei_value(&rbsp, pos) else {
            return false;
        };
        let Some((payload_size, next)) = read_sei_value(&rbsp, next) else {
            return false;
        };
        let end = next + payload_size as usize;
        if end > rbsp.len() {
            return false;
        }
        if payload_type == SEI_USER_DATA_REGISTERED_T35 && is_hdr_vivid_t35(&rbsp[next..end]) {
            return true;
        }
        pos = end;
    }
    false
}

/// Read an SEI payload type or size coded as a run of 0xFF bytes plus a tail.
fn read_sei_value(data: &[u8], mut pos: usize) -> Option<(u32, usize)> {
    let mut value = 0u32;
    loop {
        let byte = *data.get(pos)?;
        pos += 1;
        value = value.checked_add(byte as u32)?;
        if byte != 0xFF {
            return Some((value, pos));
        }
    }
}

fn is_hdr_vivid_t35(payload: &[u8]) -> bool {
    payload.len() >= 5
        && payload[0] == T35_COUNTRY_CHINA
        && u16::from_be_bytes([payload[1], payload[2]]) == T35_PROVIDER_CUVA
        && u16::from_be_bytes([payload[3], payload[4]]) == T35_PROVIDER_ORIENTED_HDR_VIVID
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::normalize::nal::RecordKind;

    /// MSB-first bit writer for synthesizing parameter sets.
    #[derive(Default)]
    struct BitWriter {
        bytes: Vec<u8>,
        bit: u8,
    }

    impl BitWriter {
        fn put_bit(&mut self, bit: bool) {
            if self.bit == 0 {
                self.bytes.push(0);
            }
            if bit {
                let last = self.bytes.len() - 1;
                self.bytes[last] |= 0x80 >> self.bit;
            }
            self.bit = (self.bit + 1) % 8;
        }

        fn put_bits(&mut self, value: u64, count: u32) {
            for i in (0..count).rev() {
                self.put_bit((value >> i) & 1 == 1);
            }
        }

        fn put_ue(&mut self, value: u32) {
            let code = value as u64 + 1;
            let len = 64 - code.leading_zeros();
            self.put_bits(0, len - 1);
            self.put_bits(code, len);
        }

        fn finish(mut self) -> Vec<u8> {
            self.put_bit(true); // rbsp_stop_one_bit
            while self.bit != 0 {
                self.put_bit(false);
            }
            self.bytes
        }
    }

    fn escape_rbsp(rbsp: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(rbsp.len() + 8);
        let mut zeros = 0;
        for &b in rbsp {
            if zeros >= 2 && b <= 3 {
                out.push(3);
                zeros = 0;
            }
            zeros = if b == 0 { zeros + 1 } else { 0 };
            out.push(b);
        }
        out
    }

    pub(crate) const TEST_VPS: [u8; 6] = [0x40, 0x01, 0x0C, 0x01, 0xFF, 0xFF];
    pub(crate) const TEST_PPS: [u8; 4] = [0x44, 0x01, 0xC1, 0x73];

    /// Main 10 SPS, 1920x1080, BT.2020 / PQ, limited range.
    pub(crate) fn test_sps() -> Vec<u8> {
        let mut w = BitWriter::default();
        w.put_bits(0, 4); // vps id
        w.put_bits(0, 3); // max_sub_layers_minus1
        w.put_bits(1, 1); // temporal_id_nesting
        w.put_bits(0x02, 8); // profile_space 0, tier 0, Main 10
        w.put_bits(0x2000_0000, 32);
        w.put_bits(0x9000_0000_0000, 48);
        w.put_bits(153, 8); // level 5.1
        w.put_ue(0); // sps id
        w.put_ue(1); // 4:2:0
        w.put_ue(1920);
        w.put_ue(1088);
        w.put_bits(1, 1); // conformance window
        w.put_ue(0);
        w.put_ue(0);
        w.put_ue(0);
        w.put_ue(4);
        w.put_ue(2); // luma 10 bit
        w.put_ue(2); // chroma 10 bit
        w.put_ue(4); // log2_max_poc_lsb = 8
        w.put_bits(1, 1); // ordering info present
        w.put_ue(4);
        w.put_ue(2);
        w.put_ue(0);
        for v in [0, 3, 0, 3, 0, 0] {
            w.put_ue(v);
        }
        // Scaling lists: first matrix explicit, the rest predicted.
        w.put_bits(1, 1);
        w.put_bits(1, 1);
        w.put_bits(1, 1);
        for _ in 0..16 {
            w.put_ue(0); // se(0) has the same code as ue(0)
        }
        for _ in 1..20 {
            w.put_bits(0, 1);
            w.put_ue(0);
        }
        w.put_bits(1, 1); // amp
        w.put_bits(1, 1); // sao
        w.put_bits(0, 1); // pcm
        w.put_ue(2); // two short-term RPS
        w.put_ue(1); // set 0: one negative
        w.put_ue(0);
        w.put_ue(0);
        w.put_bits(1, 1);
        w.put_bits(1, 1); // set 1: inter RPS prediction
        w.put_bits(0, 1);
        w.put_ue(0);
        w.put_bits(1, 1); // j=0 used
        w.put_bits(0, 1); // j=1 not used
        w.put_bits(0, 1); //      use_delta 0
        w.put_bits(1, 1); // long-term refs present
        w.put_ue(1);
        w.put_bits(5, 8);
        w.put_bits(1, 1);
        w.put_bits(1, 1); // temporal mvp
        w.put_bits(1, 1); // strong intra smoothing
        w.put_bits(1, 1); // vui present
        w.put_bits(1, 1); // aspect ratio info
        w.put_bits(255, 8);
        w.put_bits(16, 16);
        w.put_bits(16, 16);
        w.put_bits(0, 1); // overscan
        w.put_bits(1, 1); // video signal type
        w.put_bits(5, 3);
        w.put_bits(0, 1); // limited range
        w.put_bits(1, 1); // colour description
        w.put_bits(9, 8);
        w.put_bits(16, 8);
        w.put_bits(9, 8);
        w.put_bits(0, 4); // remaining vui flags

        let mut nal = vec![0x42, 0x01];
        nal.extend(escape_rbsp(&w.finish()));
        nal
    }

    pub(crate) fn hdr_vivid_sei() -> Vec<u8> {
        let t35 = [0x26, 0x00, 0x04, 0x00, 0x05, 0x01, 0x02];
        let mut nal = vec![HEVC_NAL_PREFIX_SEI << 1, 0x01, 4, t35.len() as u8];
        nal.extend_from_slice(&t35);
        nal.push(0x80);
        nal
    }

    pub(crate) fn annexb(nals: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        for nal in nals {
            out.extend_from_slice(&[0, 0, 0, 1]);
            out.extend_from_slice(nal);
        }
        out
    }

    #[test]
    fn test_parse_sps_fields() {
        let info = parse_sps(&test_sps()).unwrap();
        assert_eq!(info.ptl.profile_byte, 0x02);
        assert_eq!(info.ptl.level_idc, 153);
        assert_eq!((info.width, info.height), (1920, 1088));
        assert_eq!(info.chroma_format_idc, 1);
        assert_eq!(info.bit_depth_luma_minus8, 2);
        assert_eq!(info.full_range, Some(false));
        assert_eq!(info.primaries, Some(9));
        assert_eq!(info.transfer, Some(16));
        assert_eq!(info.matrix, Some(9));
    }

    #[test]
    fn test_build_hvcc_record() {
        let sps = test_sps();
        let au = annexb(&[&TEST_VPS, &sps, &TEST_PPS, &[0x26, 0x01, 0xAF]]);
        let mut parser = HevcParser::new();
        let record = parser.parse_extra_data(&au);

        assert_eq!(record[0], 1);
        assert_eq!(record[1], 0x02);
        assert_eq!(&record[2..6], &[0x20, 0, 0, 0]);
        assert_eq!(&record[6..12], &[0x90, 0, 0, 0, 0, 0]);
        assert_eq!(record[12], 153);
        assert_eq!(record[16], 0xFD);
        assert_eq!(record[17], 0xFA);
        assert_eq!(record[18], 0xFA);
        assert_eq!(record[21], 0x0F);
        assert_eq!(RecordKind::Hevc.length_size(&record), Some(4));
        assert_eq!(record[22], 3);
        assert_eq!(record[23], 0x80 | HEVC_NAL_VPS);
        assert_eq!(&record[24..26], &[0, 1]);
        assert_eq!(&record[26..28], &[0, TEST_VPS.len() as u8]);
        assert_eq!(&record[28..28 + TEST_VPS.len()], &TEST_VPS);
        assert!(record.ends_with(&TEST_PPS));

        assert_eq!(parser.dimensions(), Some((1920, 1088)));
        assert_eq!(parser.color_primaries(), Some(9));
        assert_eq!(parser.transfer_characteristics(), Some(16));
        assert_eq!(parser.matrix_coefficients(), Some(9));
        assert_eq!(parser.color_range(), Some(false));
        assert!(!parser.is_hdr_vivid());
    }

    #[test]
    fn test_missing_parameter_sets_yield_empty_record() {
        let mut parser = HevcParser::new();
        let au = annexb(&[&test_sps(), &[0x26, 0x01, 0xAF]]);
        assert!(parser.parse_extra_data(&au).is_empty());
        assert_eq!(parser.color_primaries(), None);
    }

    #[test]
    fn test_detects_hdr_vivid_sei() {
        let sps = test_sps();
        let sei = hdr_vivid_sei();
        let au = annexb(&[&TEST_VPS, &sps, &TEST_PPS, &sei, &[0x26, 0x01, 0xAF]]);
        let mut parser = HevcParser::new();
        assert!(!parser.parse_extra_data(&au).is_empty());
        assert!(parser.is_hdr_vivid());
    }

    #[test]
    fn test_other_t35_payload_is_not_hdr_vivid() {
        let t35 = [0xB5, 0x00, 0x3C, 0x00, 0x01, 0x04];
        let mut payload = vec![4, t35.len() as u8];
        payload.extend_from_slice(&t35);
        payload.push(0x80);
        assert!(!sei_has_hdr_vivid(&payload));
    }

    #[test]
    fn test_truncated_sps_is_rejected() {
        let sps = test_sps();
        assert!(parse_sps(&sps[..8]).is_err());
    }

    #[test]
    fn test_default_factory() {
        let factory = default_parser_factory();
        assert!(factory(CodecKind::Hevc).is_some());
        assert!(factory(CodecKind::Avc).is_none());
        assert!(factory(CodecKind::Aac).is_none());
    }
}
