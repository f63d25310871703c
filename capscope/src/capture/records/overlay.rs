//! Overlay layers mounted into a process (container runtimes).

use capscope_common::overlay;

record_view! {
    OverlayRecord
}

impl<'a> OverlayRecord<'a> {
    /// Stacking order; lower layers are searched first.
    #[must_use]
    pub fn layer(&self) -> u32 {
        self.window().u32(overlay::LAYER).unwrap_or_default()
    }

    /// Directory on the host providing the layer.
    #[must_use]
    pub fn source(&self) -> Option<&'a str> {
        self.window().cstr(overlay::DATA)
    }

    /// Where the layer appears inside the process.
    #[must_use]
    pub fn destination(&self) -> Option<&'a str> {
        let src_len = usize::from(self.window().u16(overlay::SRC_LEN).unwrap_or_default());
        self.window().cstr(overlay::DATA + src_len + 1)
    }
}
