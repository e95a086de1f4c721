use crate::document::{ElementId, OverlayElement, PageDocument, VideoSnapshot};
use sharpfocus_core::FocusSettings;
use std::collections::HashSet;

const EXTENSION_ORIGIN: &str = "extension://sharpfocus";

/// Document model held entirely in memory.
///
/// Used by the simulated browser and by tests. Playback is driven through
/// the `play`/`seek`/`finish` helpers; the caller decides which
/// [`MediaEvent`](crate::MediaEvent)s to deliver afterwards.
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    url: String,
    videos: Vec<(ElementId, VideoSnapshot)>,
    listen_calls: Vec<ElementId>,
    focus_marker: bool,
    styles: Option<FocusSettings>,
    overlays: Vec<OverlayElement>,
    scroll_locked: bool,
    prefers_dark: bool,
    globals: HashSet<String>,
}

impl MemoryDocument {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            videos: Vec::new(),
            listen_calls: Vec::new(),
            focus_marker: false,
            styles: None,
            overlays: Vec::new(),
            scroll_locked: false,
            prefers_dark: false,
            globals: HashSet::new(),
        }
    }

    /// In-place navigation; the document and its scripts survive
    pub fn set_location(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    pub fn set_prefers_dark(&mut self, dark: bool) {
        self.prefers_dark = dark;
    }

    /// Insert a paused video positioned at the start
    pub fn insert_video(&mut self, duration: f64) -> ElementId {
        let id = ElementId::new();
        self.videos.push((
            id,
            VideoSnapshot {
                paused: true,
                ended: false,
                current_time: 0.0,
                duration,
            },
        ));
        id
    }

    pub fn remove_video(&mut self, id: ElementId) {
        self.videos.retain(|(video, _)| *video != id);
    }

    pub fn play(&mut self, id: ElementId) {
        self.update_video(id, |video| {
            if video.ended {
                video.current_time = 0.0;
            }
            video.paused = false;
            video.ended = false;
        });
    }

    pub fn pause(&mut self, id: ElementId) {
        self.update_video(id, |video| video.paused = true);
    }

    pub fn seek(&mut self, id: ElementId, time: f64) {
        self.update_video(id, |video| video.current_time = time);
    }

    pub fn finish(&mut self, id: ElementId) {
        self.update_video(id, |video| {
            video.current_time = video.duration;
            video.paused = true;
            video.ended = true;
        });
    }

    /// Load a new resource into an existing element
    pub fn load(&mut self, id: ElementId, duration: f64) {
        self.update_video(id, |video| {
            *video = VideoSnapshot {
                paused: true,
                ended: false,
                current_time: 0.0,
                duration,
            };
        });
    }

    pub fn is_listening(&self, id: ElementId) -> bool {
        self.listen_calls.contains(&id)
    }

    pub fn listen_calls(&self) -> &[ElementId] {
        &self.listen_calls
    }

    pub fn focus_marker(&self) -> bool {
        self.focus_marker
    }

    pub fn styles(&self) -> Option<FocusSettings> {
        self.styles
    }

    pub fn overlays(&self) -> &[OverlayElement] {
        &self.overlays
    }

    pub fn scroll_locked(&self) -> bool {
        self.scroll_locked
    }

    fn update_video(&mut self, id: ElementId, f: impl FnOnce(&mut VideoSnapshot)) {
        if let Some((_, video)) = self.videos.iter_mut().find(|(video, _)| *video == id) {
            f(video);
        }
    }
}

impl PageDocument for MemoryDocument {
    fn location(&self) -> String {
        self.url.clone()
    }

    fn query_video(&self) -> Option<ElementId> {
        self.videos.first().map(|(id, _)| *id)
    }

    fn video(&self, element: ElementId) -> Option<VideoSnapshot> {
        self.videos
            .iter()
            .find(|(id, _)| *id == element)
            .map(|(_, video)| *video)
    }

    fn listen_media_events(&mut self, element: ElementId) {
        self.listen_calls.push(element);
    }

    fn set_focus_marker(&mut self, active: bool) {
        self.focus_marker = active;
    }

    fn update_focus_styles(&mut self, settings: &FocusSettings) {
        self.styles = Some(*settings);
    }

    fn has_element(&self, id: &str) -> bool {
        self.overlays.iter().any(|overlay| overlay.id == id)
    }

    fn append_overlay(&mut self, overlay: OverlayElement) {
        self.overlays.push(overlay);
    }

    fn remove_element(&mut self, id: &str) -> bool {
        let before = self.overlays.len();
        self.overlays.retain(|overlay| overlay.id != id);
        self.overlays.len() != before
    }

    fn set_scroll_locked(&mut self, locked: bool) {
        self.scroll_locked = locked;
    }

    fn prefers_dark_scheme(&self) -> bool {
        self.prefers_dark
    }

    fn extension_url(&self, path: &str) -> String {
        format!("{}/{}", EXTENSION_ORIGIN, path)
    }

    fn global_flag(&self, name: &str) -> bool {
        self.globals.contains(name)
    }

    fn set_global_flag(&mut self, name: &str) {
        self.globals.insert(name.to_string());
    }
}
