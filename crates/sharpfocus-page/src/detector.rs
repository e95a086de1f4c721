//! Page signal detector
//!
//! Runs on watch-site pages. Turns the video element's media events and
//! in-page navigation into start/end signals for the coordinator, and toggles
//! the page's own focus styling.

use crate::document::{CoordinatorLink, ElementId, MediaEvent, PageDocument};
use sharpfocus_core::domain::is_watch_page;
use sharpfocus_core::{FocusConfig, PageAction, StatusResponse, TabCommand};
use sharpfocus_store::{keys, ChangeSet, ExtensionSettings};

pub struct SignalDetector<L> {
    link: L,
    settings: ExtensionSettings,
    watch_url_marker: String,
    end_threshold: f64,
    video: Option<ElementId>,
    ended_sent: bool,
    last_url: String,
}

impl<L: CoordinatorLink> SignalDetector<L> {
    pub fn new(
        link: L,
        settings: ExtensionSettings,
        config: &FocusConfig,
        doc: &dyn PageDocument,
    ) -> Self {
        Self {
            link,
            settings,
            watch_url_marker: config.watch_url_marker.clone(),
            end_threshold: config.video_end_threshold_secs,
            video: None,
            ended_sent: false,
            last_url: doc.location(),
        }
    }

    pub fn tracked_video(&self) -> Option<ElementId> {
        self.video
    }

    pub fn ended_sent(&self) -> bool {
        self.ended_sent
    }

    /// Attach to a video already in the page and ask whether this tab is
    /// the focused one
    pub fn init(&mut self, doc: &mut dyn PageDocument) {
        if let Some(video) = doc.query_video() {
            self.attach(doc, video);
        }

        self.post(PageAction::CheckStatus);
        self.push_settings(doc);
    }

    /// The document's structure changed: a video may have been inserted,
    /// or the page may have navigated in place
    pub fn on_structure_changed(&mut self, doc: &mut dyn PageDocument) {
        if let Some(video) = doc.query_video() {
            self.attach(doc, video);
        }

        let url = doc.location();
        if url == self.last_url {
            return;
        }
        self.last_url = url;

        if !self.on_watch_page(doc) {
            log::debug!("Navigated away from watch page to {}", self.last_url);
            self.deactivate(doc);
            self.post(PageAction::VideoEnded);
        }
    }

    pub fn on_media_event(
        &mut self,
        doc: &mut dyn PageDocument,
        element: ElementId,
        event: MediaEvent,
    ) {
        if self.video != Some(element) {
            log::trace!("Ignoring {:?} from untracked element {:?}", event, element);
            return;
        }
        let Some(video) = doc.video(element) else {
            return;
        };

        match event {
            MediaEvent::Play => {
                if !self.on_watch_page(doc) || video.ended {
                    return;
                }
                self.ended_sent = false;
                self.activate(doc);
                self.post(PageAction::VideoStarted);
            }
            MediaEvent::Ended => self.signal_end(doc),
            MediaEvent::TimeUpdate => {
                if video.is_near_end(self.end_threshold) {
                    self.signal_end(doc);
                }
            }
            MediaEvent::LoadedData => self.ended_sent = false,
        }
    }

    pub fn on_command(&mut self, doc: &mut dyn PageDocument, command: TabCommand) {
        match command {
            TabCommand::DisableFocus => self.deactivate(doc),
            TabCommand::EnableFocus => {
                let playing = self
                    .video
                    .and_then(|id| doc.video(id))
                    .is_some_and(|video| !video.paused);
                if self.on_watch_page(doc) && playing {
                    self.activate(doc);
                }
            }
            // Overlay commands belong to the overlay agent
            TabCommand::ShowOverlay | TabCommand::RemoveOverlay => {}
        }
    }

    pub fn on_status_reply(&mut self, doc: &mut dyn PageDocument, reply: StatusResponse) {
        if reply.is_focused_tab {
            self.activate(doc);
        }
    }

    pub fn on_settings_changed(&mut self, doc: &mut dyn PageDocument, changes: &ChangeSet) {
        if changes.contains(keys::FOCUS_SETTINGS) {
            self.push_settings(doc);
        }

        let Some(change) = changes.get(keys::EXTENSION_ENABLED) else {
            return;
        };
        match change.new_value.as_ref().and_then(|value| value.as_bool()) {
            Some(false) => self.deactivate(doc),
            Some(true) => {
                let playing = self
                    .video
                    .and_then(|id| doc.video(id))
                    .is_some_and(|video| video.is_playing());
                if self.on_watch_page(doc) && playing {
                    self.activate(doc);
                    self.post(PageAction::VideoStarted);
                }
            }
            None => {}
        }
    }

    fn attach(&mut self, doc: &mut dyn PageDocument, video: ElementId) {
        if self.video == Some(video) {
            return;
        }
        log::debug!("Tracking video element {:?}", video);
        self.video = Some(video);
        doc.listen_media_events(video);
    }

    fn signal_end(&mut self, doc: &mut dyn PageDocument) {
        if self.ended_sent {
            return;
        }
        self.ended_sent = true;
        self.deactivate(doc);
        self.post(PageAction::VideoEnded);
    }

    fn activate(&self, doc: &mut dyn PageDocument) {
        if !self.settings.extension_enabled_or_default() {
            return;
        }
        doc.set_focus_marker(true);
        doc.update_focus_styles(&self.settings.focus_settings_or_default());
    }

    fn deactivate(&self, doc: &mut dyn PageDocument) {
        doc.set_focus_marker(false);
    }

    fn push_settings(&self, doc: &mut dyn PageDocument) {
        if self.settings.extension_enabled_or_default() {
            doc.update_focus_styles(&self.settings.focus_settings_or_default());
        }
    }

    fn on_watch_page(&self, doc: &dyn PageDocument) -> bool {
        is_watch_page(&doc.location(), &self.watch_url_marker)
    }

    fn post(&self, action: PageAction) {
        if let Err(e) = self.link.post(action) {
            log::debug!("Failed to post {:?}: {}", action, e);
        }
    }
}
