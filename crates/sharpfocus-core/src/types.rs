//! Common types used throughout SharpFocus

use serde::{Deserialize, Serialize};
use std::fmt;

/// Browser-assigned identifier for a tab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub u64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab#{}", self.0)
    }
}

impl From<u64> for TabId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Load lifecycle of a tab, as reported by the browser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    #[default]
    Loading,
    Complete,
}

/// Browser tab metadata.
///
/// The URL stays a raw string: privileged pages and half-loaded tabs report
/// values that are not valid web URLs, or nothing at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: TabId,
    pub url: Option<String>,
    #[serde(default)]
    pub status: LoadStatus,
}

impl TabInfo {
    pub fn new(id: TabId, url: impl Into<String>) -> Self {
        Self {
            id,
            url: Some(url.into()),
            status: LoadStatus::Complete,
        }
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

/// Change descriptor delivered with a tab-updated event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<LoadStatus>,
}

impl TabChange {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            status: None,
        }
    }

    pub fn status(status: LoadStatus) -> Self {
        Self {
            url: None,
            status: Some(status),
        }
    }

    pub fn is_load_complete(&self) -> bool {
        self.status == Some(LoadStatus::Complete)
    }
}

/// Which tab, if any, currently holds focus.
///
/// `Active` always carries its tab, so "active without a focused tab" cannot
/// be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusState {
    #[default]
    Inactive,
    Active { tab: TabId },
}

impl FocusState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    pub fn focused_tab(&self) -> Option<TabId> {
        match self {
            Self::Active { tab } => Some(*tab),
            Self::Inactive => None,
        }
    }

    pub fn is_focused(&self, tab_id: TabId) -> bool {
        self.focused_tab() == Some(tab_id)
    }
}

/// Durable form of [`FocusState`], stored under the `focusState` key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedFocusState {
    pub is_active: bool,
    pub tab_id: Option<TabId>,
}

impl From<PersistedFocusState> for FocusState {
    fn from(record: PersistedFocusState) -> Self {
        match (record.is_active, record.tab_id) {
            (true, Some(tab)) => FocusState::Active { tab },
            _ => FocusState::Inactive,
        }
    }
}

impl From<FocusState> for PersistedFocusState {
    fn from(state: FocusState) -> Self {
        Self {
            is_active: state.is_active(),
            tab_id: state.focused_tab(),
        }
    }
}

/// Overlay artwork variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

fn enabled() -> bool {
    true
}

/// Which parts of the watch page the styling collaborator hides while focused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusSettings {
    #[serde(default = "enabled")]
    pub hide_top_bar: bool,
    #[serde(default = "enabled")]
    pub hide_comments: bool,
    #[serde(default = "enabled")]
    pub hide_recommendations: bool,
    #[serde(default = "enabled")]
    pub hide_video_description: bool,
    #[serde(default = "enabled")]
    pub hide_channel_info: bool,
    #[serde(default = "enabled")]
    pub hide_shorts: bool,
}

impl Default for FocusSettings {
    fn default() -> Self {
        Self {
            hide_top_bar: true,
            hide_comments: true,
            hide_recommendations: true,
            hide_video_description: true,
            hide_channel_info: true,
            hide_shorts: true,
        }
    }
}
