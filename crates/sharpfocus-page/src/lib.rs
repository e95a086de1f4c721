//! SharpFocus in-page scripts
//!
//! Two scripts run inside pages: the [`SignalDetector`] on watch-site pages
//! and the [`OverlayAgent`] on every ordinary page. Both talk to the page
//! through [`PageDocument`] and to the coordinator through
//! [`CoordinatorLink`], so they run unchanged in the simulated browser and
//! in tests.

pub mod detector;
pub mod document;
pub mod memory;
pub mod overlay;

pub use detector::SignalDetector;
pub use document::{
    CoordinatorLink, ElementId, MediaEvent, OverlayElement, PageDocument, VideoSnapshot,
};
pub use memory::MemoryDocument;
pub use overlay::{OverlayAgent, OVERLAY_ID};

use sharpfocus_core::{StatusResponse, TabCommand};
use sharpfocus_store::ChangeSet;

/// The scripts currently loaded in one page.
///
/// Commands, status replies and store changes reach every loaded script,
/// each ignoring what is not meant for it.
pub struct PageScripts<L> {
    pub detector: Option<SignalDetector<L>>,
    pub overlay: Option<OverlayAgent<L>>,
}

impl<L> Default for PageScripts<L> {
    fn default() -> Self {
        Self {
            detector: None,
            overlay: None,
        }
    }
}

impl<L: CoordinatorLink> PageScripts<L> {
    /// A page with no scripts cannot receive messages
    pub fn is_listening(&self) -> bool {
        self.detector.is_some() || self.overlay.is_some()
    }

    pub fn on_command(&mut self, doc: &mut dyn PageDocument, command: TabCommand) {
        if let Some(detector) = &mut self.detector {
            detector.on_command(doc, command);
        }
        if let Some(overlay) = &self.overlay {
            overlay.on_command(doc, command);
        }
    }

    pub fn on_status_reply(&mut self, doc: &mut dyn PageDocument, reply: StatusResponse) {
        if let Some(detector) = &mut self.detector {
            detector.on_status_reply(doc, reply);
        }
        if let Some(overlay) = &self.overlay {
            overlay.on_status_reply(doc, reply);
        }
    }

    pub fn on_settings_changed(&mut self, doc: &mut dyn PageDocument, changes: &ChangeSet) {
        if let Some(detector) = &mut self.detector {
            detector.on_settings_changed(doc, changes);
        }
    }
}
