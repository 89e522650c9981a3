//! Bitstream normalization between producers and the container backend.
//!
//! Each track owns a [`BitstreamNormalizer`]. It inspects the first media
//! sample to decide how the track is framed (Annex-B vs length-prefixed NAL
//! units, ADTS vs raw AAC), derives the codec configuration record when the
//! track format did not supply one, resolves color metadata, and rewrites
//! every later payload into the framing the container stores.

pub mod aac;
pub mod bits;
pub mod framing;
pub mod nal;
pub mod parser;

use mm_common::{keys, CodecKind, ColorDescription, ColorInfo, MediaFormat, Sample};

use crate::error::{MuxError, MuxResult};
use framing::{strategy_for, Framing, FramingStrategy};
use parser::ParserFactory;

/// Codec configuration forwarded to the backend.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CodecConfig {
    /// Decoder configuration record (`avcC`/`hvcC` body, AudioSpecificConfig,
    /// decoder specific info), empty when unknown.
    pub extradata: Vec<u8>,
    pub color: Option<ColorInfo>,
    pub hdr_vivid: bool,
}

/// Result of normalizing one submitted sample.
#[derive(Debug, Default)]
pub struct Normalized {
    /// Sample to enqueue, or `None` when the input was consumed.
    pub sample: Option<Sample>,
    /// New codec configuration to forward before `sample`.
    pub config_update: Option<CodecConfig>,
}

/// Explicit color keys of a track format.
pub(crate) fn explicit_color(format: &MediaFormat) -> MuxResult<ColorDescription> {
    let code = |key: &str| -> MuxResult<Option<u8>> {
        Ok(format.opt_int(key)?.map(|v| v.clamp(0, 255) as u8))
    };
    Ok(ColorDescription {
        primaries: code(keys::COLOR_PRIMARIES)?,
        transfer: code(keys::TRANSFER_CHARACTERISTICS)?,
        matrix: code(keys::MATRIX_COEFFICIENTS)?,
        full_range: format.opt_int(keys::RANGE_FLAG)?.map(|v| v != 0),
    })
}

pub struct BitstreamNormalizer {
    codec: CodecKind,
    strategy: Box<dyn FramingStrategy>,
    first_frame_done: bool,
    config: Option<Vec<u8>>,
    explicit_color: ColorDescription,
    explicit_hdr_vivid: bool,
    current: CodecConfig,
}

impl BitstreamNormalizer {
    pub fn new(codec: CodecKind, format: &MediaFormat, parsers: &ParserFactory) -> MuxResult<Self> {
        let config = format
            .opt_buffer(keys::CODEC_CONFIG)?
            .filter(|c| !c.is_empty())
            .map(<[u8]>::to_vec);
        let explicit_color = explicit_color(format)?;
        let explicit_hdr_vivid = format.opt_int(keys::HDR_VIVID)?.is_some_and(|v| v != 0);

        let current = CodecConfig {
            extradata: config.clone().unwrap_or_default(),
            color: explicit_color.resolve(),
            hdr_vivid: explicit_hdr_vivid,
        };
        Ok(Self {
            codec,
            strategy: strategy_for(codec, parsers(codec)),
            first_frame_done: false,
            config,
            explicit_color,
            explicit_hdr_vivid,
            current,
        })
    }

    pub fn codec(&self) -> CodecKind {
        self.codec
    }

    /// Configuration as currently known to the backend.
    pub fn codec_config(&self) -> &CodecConfig {
        &self.current
    }

    pub fn first_frame_processed(&self) -> bool {
        self.first_frame_done
    }

    pub fn needs_transcoding(&self) -> bool {
        self.strategy.is_transcoding()
    }

    pub fn process(&mut self, mut sample: Sample) -> MuxResult<Normalized> {
        if sample.is_eos() && sample.is_empty() {
            return Ok(Normalized {
                sample: Some(sample),
                config_update: None,
            });
        }

        if !self.first_frame_done {
            match self.strategy.detect_framing(&sample, self.config.as_deref())? {
                Framing::ConfigOnly => {
                    tracing::debug!(
                        codec = ?self.codec,
                        bytes = sample.len(),
                        "Consumed codec config sample"
                    );
                    self.take_config_sample(&sample.data)?;
                    return Ok(Normalized {
                        sample: None,
                        config_update: self.refresh(),
                    });
                }
                framing => {
                    if self.config.is_none() {
                        self.config = self.strategy.extract_config(&sample.data)?;
                        let required = framing == Framing::Transcode && self.codec.is_nal_based();
                        if self.config.is_none() && required {
                            return Err(MuxError::InvalidData(format!(
                                "No {} parameter sets in first frame and no codec_config",
                                self.codec.display_name()
                            )));
                        }
                    }
                    self.first_frame_done = true;
                    tracing::debug!(
                        codec = ?self.codec,
                        ?framing,
                        has_config = self.config.is_some(),
                        "Detected track framing"
                    );
                }
            }
        } else if sample.is_codec_data() && !sample.is_sync() {
            tracing::debug!(codec = ?self.codec, bytes = sample.len(), "Consumed codec config sample");
            self.take_config_sample(&sample.data)?;
            return Ok(Normalized {
                sample: None,
                config_update: self.refresh(),
            });
        }

        let config_update = self.refresh();
        sample.data = self.strategy.transcode_if_needed(std::mem::take(&mut sample.data))?;
        Ok(Normalized {
            sample: Some(sample),
            config_update,
        })
    }

    fn take_config_sample(&mut self, data: &[u8]) -> MuxResult<()> {
        let config = self
            .strategy
            .extract_config(data)?
            .unwrap_or_else(|| data.to_vec());
        self.config = Some(config);
        Ok(())
    }

    /// Recompute the backend-facing configuration; return it if it changed.
    fn refresh(&mut self) -> Option<CodecConfig> {
        let mut extradata = self.config.clone().unwrap_or_default();
        self.strategy.fix_config(&mut extradata);
        if let Some(config) = self.config.as_mut() {
            config.clone_from(&extradata);
        }

        let next = CodecConfig {
            extradata,
            color: self.explicit_color.or(self.strategy.color()).resolve(),
            hdr_vivid: self.explicit_hdr_vivid || self.strategy.hdr_vivid(),
        };
        if next == self.current {
            return None;
        }
        self.current = next.clone();
        Some(next)
    }
}
