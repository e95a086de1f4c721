//! Messages exchanged between pages and the background coordinator.
//!
//! The JSON shapes match what the extension scripts put on the wire:
//! page requests are tagged by `action`, coordinator commands by `type`.

use serde::{Deserialize, Serialize};

/// Page → coordinator request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PageAction {
    VideoStarted,
    VideoEnded,
    CheckStatus,
}

/// Coordinator → page command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TabCommand {
    ShowOverlay,
    RemoveOverlay,
    EnableFocus,
    DisableFocus,
}

/// Reply to [`PageAction::CheckStatus`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub is_focused_tab: bool,
}
