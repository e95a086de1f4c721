//! The page as seen from an injected script

use sharpfocus_core::{FocusResult, FocusSettings, PageAction, Theme};
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of a DOM element, stable for the element's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub u64);

impl ElementId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

/// Media events the detector listens for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaEvent {
    /// Playback started or resumed.
    Play,
    /// Playback reached the end.
    Ended,
    /// Playback position moved.
    TimeUpdate,
    /// First frame of a (new) resource is available.
    LoadedData,
}

/// Playback state of a video element at the moment an event fires
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoSnapshot {
    pub paused: bool,
    pub ended: bool,
    /// Seconds
    pub current_time: f64,
    /// Seconds; NaN until metadata is known
    pub duration: f64,
}

impl VideoSnapshot {
    /// Within `threshold` seconds of a known, positive duration
    pub fn is_near_end(&self, threshold: f64) -> bool {
        self.duration > 0.0 && self.current_time >= self.duration - threshold
    }

    pub fn is_playing(&self) -> bool {
        !self.paused && !self.ended
    }
}

/// Full-viewport element that blocks a tab's content
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayElement {
    pub id: String,
    pub theme: Theme,
    /// Inline style, including the themed background image
    pub style: String,
}

/// DOM and window facilities used by the in-page scripts.
///
/// Styling of the watch page itself is delegated: the document owns the
/// stylesheet that turns [`FocusSettings`] into hidden sections, the scripts
/// only toggle the marker and push the settings.
pub trait PageDocument {
    /// Current `location.href`
    fn location(&self) -> String;

    /// First `<video>` in the document
    fn query_video(&self) -> Option<ElementId>;

    fn video(&self, element: ElementId) -> Option<VideoSnapshot>;

    /// Start forwarding [`MediaEvent`]s of `element` to the page scripts
    fn listen_media_events(&mut self, element: ElementId);

    /// Add or remove the body class that activates focus styling
    fn set_focus_marker(&mut self, active: bool);

    fn update_focus_styles(&mut self, settings: &FocusSettings);

    fn has_element(&self, id: &str) -> bool;

    fn append_overlay(&mut self, overlay: OverlayElement);

    /// Returns whether an element was removed
    fn remove_element(&mut self, id: &str) -> bool;

    /// `overflow: hidden` on the body while locked
    fn set_scroll_locked(&mut self, locked: bool);

    /// `(prefers-color-scheme: dark)`
    fn prefers_dark_scheme(&self) -> bool;

    /// Resolve a packaged asset path to a loadable URL
    fn extension_url(&self, path: &str) -> String;

    /// Window-global flags shared by every script injected into the page
    fn global_flag(&self, name: &str) -> bool;

    fn set_global_flag(&mut self, name: &str);
}

/// Channel from a page script to the background coordinator.
///
/// Posting never waits for an answer; the host routes the reply to a
/// [`PageAction::CheckStatus`] back to the scripts' `on_status_reply`.
pub trait CoordinatorLink {
    fn post(&self, action: PageAction) -> FocusResult<()>;
}
