//! Tab overlay agent
//!
//! Injected into every ordinary page. Covers the page with a full-viewport
//! block while another tab holds focus.

use crate::document::{CoordinatorLink, OverlayElement, PageDocument};
use sharpfocus_core::{PageAction, StatusResponse, TabCommand, Theme};
use sharpfocus_store::ExtensionSettings;

pub const OVERLAY_ID: &str = "sharp-focus-overlay";

/// Window flag marking that a command listener is already installed
pub const LISTENER_FLAG: &str = "hasSharpFocusOverlayListener";

const OVERLAY_STYLE: &str = "position: fixed !important; \
top: 0 !important; \
left: 0 !important; \
width: 100vw !important; \
height: 100vh !important; \
z-index: 2147483647 !important; \
display: flex !important; \
align-items: center !important; \
justify-content: center !important; \
pointer-events: auto !important;";

pub fn asset_path(theme: Theme) -> &'static str {
    match theme {
        Theme::Light => "assets/blocked-light.png",
        Theme::Dark => "assets/blocked-dark.png",
    }
}

pub struct OverlayAgent<L> {
    link: L,
    settings: ExtensionSettings,
}

impl<L: CoordinatorLink> OverlayAgent<L> {
    pub fn new(link: L, settings: ExtensionSettings) -> Self {
        Self { link, settings }
    }

    /// Claim the page's command listener slot.
    ///
    /// Returns `false` if an earlier injection already holds it; that agent
    /// keeps serving commands.
    pub fn install(&self, doc: &mut dyn PageDocument) -> bool {
        if doc.global_flag(LISTENER_FLAG) {
            return false;
        }
        doc.set_global_flag(LISTENER_FLAG);
        true
    }

    /// Ask the coordinator whether this tab is the focused one
    pub fn check_status(&self) {
        if let Err(e) = self.link.post(PageAction::CheckStatus) {
            log::debug!("Status check failed: {}", e);
        }
    }

    pub fn on_command(&self, doc: &mut dyn PageDocument, command: TabCommand) {
        match command {
            TabCommand::ShowOverlay => self.show_overlay(doc),
            TabCommand::RemoveOverlay => self.remove_overlay(doc),
            TabCommand::EnableFocus | TabCommand::DisableFocus => {}
        }
    }

    pub fn on_status_reply(&self, doc: &mut dyn PageDocument, reply: StatusResponse) {
        if reply.is_focused_tab {
            self.remove_overlay(doc);
        }
    }

    pub fn show_overlay(&self, doc: &mut dyn PageDocument) {
        if doc.has_element(OVERLAY_ID) {
            return;
        }

        let theme = self.theme(doc);
        let image = doc.extension_url(asset_path(theme));
        doc.append_overlay(OverlayElement {
            id: OVERLAY_ID.to_string(),
            theme,
            style: format!(
                "{} background: url('{}') center/cover no-repeat !important;",
                OVERLAY_STYLE, image
            ),
        });
        doc.set_scroll_locked(true);
    }

    pub fn remove_overlay(&self, doc: &mut dyn PageDocument) {
        doc.remove_element(OVERLAY_ID);
        doc.set_scroll_locked(false);
    }

    /// Stored preference, else the system colour scheme
    pub fn theme(&self, doc: &dyn PageDocument) -> Theme {
        match self.settings.theme() {
            Ok(Some(theme)) => theme,
            Ok(None) => system_theme(doc),
            Err(e) => {
                log::warn!("Failed to read theme: {}", e);
                system_theme(doc)
            }
        }
    }
}

fn system_theme(doc: &dyn PageDocument) -> Theme {
    if doc.prefers_dark_scheme() {
        Theme::Dark
    } else {
        Theme::Light
    }
}
