//! Load-time configuration.

use capscope_common as wire;
use tokio_util::sync::CancellationToken;

use super::progress::ProgressSink;
use crate::capture::FrameKind;

/// Options controlling how a capture is indexed.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Every record length must be a multiple of this.
    pub alignment: usize,
    /// Kinds whose timestamps may push the end of the time span out.
    pub data_bearing: Vec<FrameKind>,
    pub progress: ProgressSink,
    /// Checked between scan batches and enrichment stages.
    pub cancel: CancellationToken,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            alignment: wire::CAPTURE_ALIGN,
            data_bearing: FrameKind::DATA_BEARING.to_vec(),
            progress: ProgressSink::None,
            cancel: CancellationToken::new(),
        }
    }
}

impl LoadOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require records to be aligned to `alignment` bytes. Zero is treated
    /// as one (no alignment requirement).
    #[must_use]
    pub fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment.max(1);
        self
    }

    #[must_use]
    pub fn with_data_bearing(mut self, kinds: impl IntoIterator<Item = FrameKind>) -> Self {
        self.data_bearing = kinds.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub(crate) fn data_bearing_mask(&self) -> [bool; FrameKind::ALL.len()] {
        let mut mask = [false; FrameKind::ALL.len()];
        for kind in &self.data_bearing {
            mask[kind.index()] = true;
        }
        mask
    }
}
