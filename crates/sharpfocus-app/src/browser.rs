//! Simulated browser
//!
//! A single-threaded stand-in for the extension host: tabs, page documents
//! with their loaded scripts, and one FIFO queue carrying every runtime
//! message. Each message runs to completion before the next is taken.

use anyhow::{anyhow, bail, Result};
use serde::Serialize;
use sharpfocus_coordinator::{CoordinatorEvent, FocusCoordinator, TabHost};
use sharpfocus_core::domain::{is_domain_whitelisted, is_watch_page, tab_domain};
use sharpfocus_core::types::PersistedFocusState;
use sharpfocus_core::{
    FocusConfig, FocusError, FocusResult, LoadStatus, PageAction, StatusResponse, TabChange,
    TabCommand, TabId, TabInfo, Theme,
};
use sharpfocus_page::{
    CoordinatorLink, ElementId, MediaEvent, MemoryDocument, OverlayAgent, PageDocument,
    PageScripts, SignalDetector, OVERLAY_ID,
};
use sharpfocus_store::{ChangeSet, ExtensionSettings};
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};

/// Length given to videos that appear without an explicit duration
const DEFAULT_VIDEO_SECS: f64 = 600.0;

#[derive(Debug)]
enum Envelope {
    ToCoordinator { sender: TabId, action: PageAction },
    ToPage { tab: TabId, command: TabCommand },
    StatusReply { tab: TabId, reply: StatusResponse },
}

type Queue = Rc<RefCell<VecDeque<Envelope>>>;

/// Runtime messaging endpoint of one tab's scripts
#[derive(Clone)]
pub struct PageLink {
    tab: TabId,
    queue: Queue,
}

impl CoordinatorLink for PageLink {
    fn post(&self, action: PageAction) -> FocusResult<()> {
        self.queue.borrow_mut().push_back(Envelope::ToCoordinator {
            sender: self.tab,
            action,
        });
        Ok(())
    }
}

struct Page {
    doc: MemoryDocument,
    scripts: PageScripts<PageLink>,
}

struct SimTab {
    info: TabInfo,
    /// `None` while loading and for pages scripts cannot access
    page: Option<Page>,
    /// Whether the next load runs the content scripts declared for it
    content_scripts: bool,
}

/// The browser as the coordinator sees it
#[derive(Clone)]
pub struct BrowserHandle {
    tabs: Rc<RefCell<BTreeMap<TabId, SimTab>>>,
    queue: Queue,
    settings: ExtensionSettings,
}

impl BrowserHandle {
    fn link(&self, tab: TabId) -> PageLink {
        PageLink {
            tab,
            queue: self.queue.clone(),
        }
    }
}

impl TabHost for BrowserHandle {
    fn query_tabs(&self) -> FocusResult<Vec<TabInfo>> {
        Ok(self
            .tabs
            .borrow()
            .values()
            .map(|tab| tab.info.clone())
            .collect())
    }

    fn send_command(&self, tab_id: TabId, command: TabCommand) -> FocusResult<()> {
        let listening = self
            .tabs
            .borrow()
            .get(&tab_id)
            .and_then(|tab| tab.page.as_ref())
            .is_some_and(|page| page.scripts.is_listening());
        if !listening {
            return Err(FocusError::unreachable(format!(
                "Could not establish connection to {}: receiving end does not exist",
                tab_id
            )));
        }

        self.queue
            .borrow_mut()
            .push_back(Envelope::ToPage { tab: tab_id, command });
        Ok(())
    }

    fn inject_overlay_agent(&self, tab_id: TabId) -> FocusResult<()> {
        let mut tabs = self.tabs.borrow_mut();
        let page = tabs
            .get_mut(&tab_id)
            .and_then(|tab| tab.page.as_mut())
            .ok_or_else(|| {
                FocusError::injection(format!("Missing host permission for {}", tab_id))
            })?;

        let agent = OverlayAgent::new(self.link(tab_id), self.settings.clone());
        let installed = agent.install(&mut page.doc);
        agent.check_status();
        if installed {
            page.scripts.overlay = Some(agent);
        }
        Ok(())
    }
}

/// Tab state as reported in a session summary
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabSummary {
    pub id: TabId,
    pub url: Option<String>,
    pub status: LoadStatus,
    pub scripted: bool,
    pub overlay: Option<Theme>,
    pub scroll_locked: bool,
    pub focus_styling: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub focused_tab: Option<TabId>,
    pub persisted_focus: Option<PersistedFocusState>,
    pub extension_enabled: bool,
    pub tabs: Vec<TabSummary>,
}

pub struct SimBrowser {
    handle: BrowserHandle,
    coordinator: FocusCoordinator<BrowserHandle>,
    config: FocusConfig,
    changes: broadcast::Receiver<ChangeSet>,
}

impl SimBrowser {
    pub fn new(settings: ExtensionSettings, config: FocusConfig) -> Self {
        let changes = settings.subscribe();
        let handle = BrowserHandle {
            tabs: Rc::default(),
            queue: Rc::default(),
            settings: settings.clone(),
        };
        let coordinator = FocusCoordinator::new(handle.clone(), settings, &config);

        Self {
            handle,
            coordinator,
            config,
            changes,
        }
    }

    pub fn settings(&self) -> &ExtensionSettings {
        &self.handle.settings
    }

    #[cfg(test)]
    pub fn coordinator(&self) -> &FocusCoordinator<BrowserHandle> {
        &self.coordinator
    }

    /// Open a tab and start loading `url`.
    ///
    /// With `content_scripts` off the page loads without any extension
    /// script, as for tabs that were open before the extension was installed.
    pub fn open_tab(
        &mut self,
        tab_id: TabId,
        url: &str,
        pending: bool,
        content_scripts: bool,
    ) -> Result<()> {
        let info = {
            let mut tabs = self.handle.tabs.borrow_mut();
            if tabs.contains_key(&tab_id) {
                bail!("{} is already open", tab_id);
            }
            let info = TabInfo {
                id: tab_id,
                url: Some(url.to_string()),
                status: LoadStatus::Loading,
            };
            tabs.insert(
                tab_id,
                SimTab {
                    info: info.clone(),
                    page: None,
                    content_scripts,
                },
            );
            info
        };
        debug!("Opened {} at {}", tab_id, url);

        self.dispatch(CoordinatorEvent::TabUpdated {
            tab_id,
            change: TabChange {
                url: Some(url.to_string()),
                status: Some(LoadStatus::Loading),
            },
            tab: info,
        });

        if !pending {
            self.finish_loading(tab_id)?;
        }
        Ok(())
    }

    /// Navigate a tab.
    ///
    /// Moving within the watch site keeps the document and only changes its
    /// location; anything else is a full page load.
    pub fn navigate(&mut self, tab_id: TabId, url: &str, pending: bool) -> Result<()> {
        let in_place_info = {
            let mut tabs = self.handle.tabs.borrow_mut();
            let tab = tabs
                .get_mut(&tab_id)
                .ok_or_else(|| anyhow!("Unknown {}", tab_id))?;

            match tab.page.as_mut() {
                Some(page)
                    if page.scripts.detector.is_some() && on_watch_site(&self.config, url) =>
                {
                    page.doc.set_location(url);
                    self.replace_video(page, url);
                    if let Some(detector) = &mut page.scripts.detector {
                        detector.on_structure_changed(&mut page.doc);
                    }
                    tab.info.url = Some(url.to_string());
                    Some(tab.info.clone())
                }
                _ => None,
            }
        };

        match in_place_info {
            Some(info) => {
                debug!("{} moved in place to {}", tab_id, url);
                self.dispatch(CoordinatorEvent::TabUpdated {
                    tab_id,
                    change: TabChange::url(url),
                    tab: info,
                });
                Ok(())
            }
            None => self.load(tab_id, url, pending),
        }
    }

    /// Reload the tab's current URL from scratch
    pub fn reload(&mut self, tab_id: TabId, pending: bool) -> Result<()> {
        let url = self
            .handle
            .tabs
            .borrow()
            .get(&tab_id)
            .ok_or_else(|| anyhow!("Unknown {}", tab_id))?
            .info
            .url
            .clone()
            .unwrap_or_default();
        self.load(tab_id, &url, pending)
    }

    /// Full page load: drop the document and its scripts
    fn load(&mut self, tab_id: TabId, url: &str, pending: bool) -> Result<()> {
        let info = {
            let mut tabs = self.handle.tabs.borrow_mut();
            let tab = tabs
                .get_mut(&tab_id)
                .ok_or_else(|| anyhow!("Unknown {}", tab_id))?;
            tab.info.url = Some(url.to_string());
            tab.info.status = LoadStatus::Loading;
            tab.page = None;
            tab.content_scripts = true;
            tab.info.clone()
        };
        debug!("Loading {} in {}", url, tab_id);

        self.dispatch(CoordinatorEvent::TabUpdated {
            tab_id,
            change: TabChange {
                url: Some(url.to_string()),
                status: Some(LoadStatus::Loading),
            },
            tab: info,
        });

        if !pending {
            self.finish_loading(tab_id)?;
        }
        Ok(())
    }

    /// Complete the current load: build the document and run content scripts
    pub fn finish_loading(&mut self, tab_id: TabId) -> Result<()> {
        let info = {
            let mut tabs = self.handle.tabs.borrow_mut();
            let tab = tabs
                .get_mut(&tab_id)
                .ok_or_else(|| anyhow!("Unknown {}", tab_id))?;
            if tab.info.status == LoadStatus::Complete {
                bail!("{} is not loading", tab_id);
            }
            tab.info.status = LoadStatus::Complete;

            // Only ordinary web pages are reachable by scripts
            let url = tab.info.url.clone().unwrap_or_default();
            tab.page = tab_domain(Some(&url)).map(|_| {
                let mut doc = MemoryDocument::new(url.as_str());
                if is_watch_page(&url, &self.config.watch_url_marker) {
                    doc.insert_video(DEFAULT_VIDEO_SECS);
                }
                Page {
                    doc,
                    scripts: PageScripts::default(),
                }
            });

            if tab.content_scripts {
                if let Some(page) = tab.page.as_mut() {
                    self.run_content_scripts(tab_id, page);
                }
            }
            tab.info.clone()
        };

        self.dispatch(CoordinatorEvent::TabUpdated {
            tab_id,
            change: TabChange::status(LoadStatus::Complete),
            tab: info,
        });
        Ok(())
    }

    pub fn close_tab(&mut self, tab_id: TabId) -> Result<()> {
        if self.handle.tabs.borrow_mut().remove(&tab_id).is_none() {
            bail!("Unknown {}", tab_id);
        }
        debug!("Closed {}", tab_id);

        self.dispatch(CoordinatorEvent::TabRemoved { tab_id });
        Ok(())
    }

    /// Start or resume the tab's video
    pub fn play(&mut self, tab_id: TabId) -> Result<()> {
        self.drive_video(tab_id, |doc, video| {
            doc.play(video);
            vec![MediaEvent::Play]
        })
    }

    pub fn pause(&mut self, tab_id: TabId) -> Result<()> {
        self.drive_video(tab_id, |doc, video| {
            doc.pause(video);
            Vec::new()
        })
    }

    /// Let a playing video run for `seconds`
    pub fn advance(&mut self, tab_id: TabId, seconds: f64) -> Result<()> {
        self.drive_video(tab_id, |doc, video| {
            let Some(snapshot) = doc.video(video).filter(|v| v.is_playing()) else {
                return Vec::new();
            };

            let target = snapshot.current_time + seconds;
            if target >= snapshot.duration {
                doc.seek(video, snapshot.duration);
                let mut events = vec![MediaEvent::TimeUpdate];
                doc.finish(video);
                events.push(MediaEvent::Ended);
                events
            } else {
                doc.seek(video, target);
                vec![MediaEvent::TimeUpdate]
            }
        })
    }

    /// Play the video through to its end
    pub fn end_video(&mut self, tab_id: TabId) -> Result<()> {
        self.drive_video(tab_id, |doc, video| {
            doc.finish(video);
            vec![MediaEvent::Ended]
        })
    }

    /// Tear down the coordinator and start a fresh one, as when the browser
    /// unloads an idle background process
    pub fn restart_background(&mut self) {
        info!("Restarting background coordinator");
        self.coordinator = FocusCoordinator::new(
            self.handle.clone(),
            self.handle.settings.clone(),
            &self.config,
        );
        self.pump();
    }

    /// Deliver queued messages and store changes until both are drained
    pub fn pump(&mut self) {
        loop {
            self.drain_store_changes();

            let next = self.handle.queue.borrow_mut().pop_front();
            let Some(envelope) = next else {
                break;
            };

            match envelope {
                Envelope::ToCoordinator { sender, action } => {
                    if let Some(reply) = self.coordinator.handle_message(Some(sender), action) {
                        self.handle
                            .queue
                            .borrow_mut()
                            .push_back(Envelope::StatusReply { tab: sender, reply });
                    }
                }
                Envelope::ToPage { tab, command } => self.with_page(tab, |page| {
                    page.scripts.on_command(&mut page.doc, command);
                }),
                Envelope::StatusReply { tab, reply } => self.with_page(tab, |page| {
                    page.scripts.on_status_reply(&mut page.doc, reply);
                }),
            }
        }
    }

    #[cfg(test)]
    pub fn has_overlay(&self, tab_id: TabId) -> bool {
        self.inspect(tab_id, |page| page.doc.has_element(OVERLAY_ID))
    }

    #[cfg(test)]
    pub fn has_focus_styling(&self, tab_id: TabId) -> bool {
        self.inspect(tab_id, |page| page.doc.focus_marker())
    }

    pub fn summary(&self) -> SessionSummary {
        let persisted_focus = match self.settings().focus_state() {
            Ok(record) => record,
            Err(e) => {
                warn!("Failed to read focus state: {}", e);
                None
            }
        };

        let tabs = self
            .handle
            .tabs
            .borrow()
            .values()
            .map(|tab| {
                let page = tab.page.as_ref();
                TabSummary {
                    id: tab.info.id,
                    url: tab.info.url.clone(),
                    status: tab.info.status,
                    scripted: page.is_some_and(|p| p.scripts.is_listening()),
                    overlay: page.and_then(|p| {
                        p.doc
                            .overlays()
                            .iter()
                            .find(|overlay| overlay.id == OVERLAY_ID)
                            .map(|overlay| overlay.theme)
                    }),
                    scroll_locked: page.is_some_and(|p| p.doc.scroll_locked()),
                    focus_styling: page.is_some_and(|p| p.doc.focus_marker()),
                }
            })
            .collect();

        SessionSummary {
            focused_tab: self.coordinator.state().focused_tab(),
            persisted_focus,
            extension_enabled: self.settings().extension_enabled_or_default(),
            tabs,
        }
    }

    fn dispatch(&mut self, event: CoordinatorEvent) {
        self.coordinator.handle_event(event);
        self.pump();
    }

    fn drain_store_changes(&mut self) {
        loop {
            match self.changes.try_recv() {
                Ok(changes) => self.apply_store_changes(&changes),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Missed {} store change sets, resyncing settings", skipped);
                    match self.settings().resync_changes() {
                        Ok(changes) => self.apply_store_changes(&changes),
                        Err(e) => warn!("Failed to resync settings: {}", e),
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    fn apply_store_changes(&mut self, changes: &ChangeSet) {
        self.coordinator
            .handle_event(CoordinatorEvent::StorageChanged(changes.clone()));

        let mut tabs = self.handle.tabs.borrow_mut();
        for page in tabs.values_mut().filter_map(|tab| tab.page.as_mut()) {
            page.scripts.on_settings_changed(&mut page.doc, changes);
        }
    }

    /// Declared content scripts: the overlay agent on every page, the
    /// detector on the watch site
    fn run_content_scripts(&self, tab_id: TabId, page: &mut Page) {
        let settings = &self.handle.settings;

        let overlay = OverlayAgent::new(self.handle.link(tab_id), settings.clone());
        if overlay.install(&mut page.doc) {
            page.scripts.overlay = Some(overlay);
        }

        if on_watch_site(&self.config, &page.doc.location()) {
            let mut detector = SignalDetector::new(
                self.handle.link(tab_id),
                settings.clone(),
                &self.config,
                &page.doc,
            );
            detector.init(&mut page.doc);
            page.scripts.detector = Some(detector);
        }

        if let Some(overlay) = &page.scripts.overlay {
            overlay.check_status();
        }
    }

    /// In-place navigation to another watch page loads a new resource into
    /// the existing player
    fn replace_video(&self, page: &mut Page, url: &str) {
        if !is_watch_page(url, &self.config.watch_url_marker) {
            return;
        }
        match page.doc.query_video() {
            Some(video) => {
                page.doc.load(video, DEFAULT_VIDEO_SECS);
                if let Some(detector) = &mut page.scripts.detector {
                    detector.on_media_event(&mut page.doc, video, MediaEvent::LoadedData);
                }
            }
            None => {
                page.doc.insert_video(DEFAULT_VIDEO_SECS);
            }
        }
    }

    fn drive_video(
        &mut self,
        tab_id: TabId,
        f: impl FnOnce(&mut MemoryDocument, ElementId) -> Vec<MediaEvent>,
    ) -> Result<()> {
        {
            let mut tabs = self.handle.tabs.borrow_mut();
            let page = tabs
                .get_mut(&tab_id)
                .and_then(|tab| tab.page.as_mut())
                .ok_or_else(|| anyhow!("{} has no loaded page", tab_id))?;

            let video = match page.doc.query_video() {
                Some(video) => video,
                None => {
                    let video = page.doc.insert_video(DEFAULT_VIDEO_SECS);
                    if let Some(detector) = &mut page.scripts.detector {
                        detector.on_structure_changed(&mut page.doc);
                    }
                    video
                }
            };

            let events = f(&mut page.doc, video);
            if let Some(detector) = &mut page.scripts.detector {
                for event in events {
                    detector.on_media_event(&mut page.doc, video, event);
                }
            }
        }

        self.pump();
        Ok(())
    }

    fn with_page(&self, tab_id: TabId, f: impl FnOnce(&mut Page)) {
        let mut tabs = self.handle.tabs.borrow_mut();
        match tabs.get_mut(&tab_id).and_then(|tab| tab.page.as_mut()) {
            Some(page) => f(page),
            None => debug!("Dropping message for {}: no page", tab_id),
        }
    }

    #[cfg(test)]
    fn inspect(&self, tab_id: TabId, f: impl FnOnce(&Page) -> bool) -> bool {
        self.handle
            .tabs
            .borrow()
            .get(&tab_id)
            .and_then(|tab| tab.page.as_ref())
            .is_some_and(f)
    }
}

/// Pages the detector is declared for: any host under the site part of the
/// watch marker
fn on_watch_site(config: &FocusConfig, url: &str) -> bool {
    let site = config
        .watch_url_marker
        .split('/')
        .next()
        .unwrap_or_default();
    tab_domain(Some(url)).is_some_and(|domain| is_domain_whitelisted(&domain, &[site]))
}
