//! Encoded samples: the unit of work flowing from producers to the container.

use bitflags::bitflags;

bitflags! {
    /// Per-sample flag bitset. Bit values match the integer API.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct SampleFlags: u32 {
        /// Last sample of the stream; may carry no payload.
        const EOS = 1 << 0;
        /// Random access point (IDR / IRAP / every audio frame).
        const SYNC_FRAME = 1 << 1;
        /// Payload is codec configuration rather than media.
        const CODEC_DATA = 1 << 3;
        /// No other sample depends on this one.
        const DISPOSABLE = 1 << 5;
        /// Droppable within an extended temporal layer.
        const DISPOSABLE_EXT = 1 << 6;
    }
}

/// One encoded access unit.
///
/// The payload is owned and moved through the pipeline; nothing downstream
/// clones it except the Annex-B to length-prefixed conversion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sample {
    pub data: Vec<u8>,
    /// Presentation timestamp in microseconds.
    pub pts: i64,
    /// Decode timestamp in microseconds, when the producer knows it.
    pub dts: Option<i64>,
    pub flags: SampleFlags,
}

impl Sample {
    pub fn new(data: Vec<u8>, pts: i64, flags: SampleFlags) -> Self {
        Self {
            data,
            pts,
            dts: None,
            flags,
        }
    }

    /// Empty end-of-stream marker.
    pub fn end_of_stream(pts: i64) -> Self {
        Self::new(Vec::new(), pts, SampleFlags::EOS)
    }

    pub fn with_dts(mut self, dts: i64) -> Self {
        self.dts = Some(dts);
        self
    }

    /// Decode time, falling back to the presentation time.
    pub fn decode_time(&self) -> i64 {
        self.dts.unwrap_or(self.pts)
    }

    pub fn is_sync(&self) -> bool {
        self.flags.contains(SampleFlags::SYNC_FRAME)
    }

    pub fn is_codec_data(&self) -> bool {
        self.flags.contains(SampleFlags::CODEC_DATA)
    }

    pub fn is_eos(&self) -> bool {
        self.flags.contains(SampleFlags::EOS)
    }

    pub fn is_disposable(&self) -> bool {
        self.flags
            .intersects(SampleFlags::DISPOSABLE | SampleFlags::DISPOSABLE_EXT)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
