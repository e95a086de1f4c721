//! Background focus coordinator
//!
//! Owns the single authoritative [`FocusState`]: which tab, if any, is the one
//! the user is watching. Every other open tab is overlaid while focus is
//! active. The state is mirrored to the durable store so that a coordinator
//! torn down by the browser can pick up where it left off.

pub mod delivery;
pub mod host;

use sharpfocus_core::domain::{is_domain_whitelisted, is_watch_page, tab_domain};
use sharpfocus_core::{
    FocusConfig, FocusState, PageAction, StatusResponse, TabChange, TabCommand, TabId, TabInfo,
};
use sharpfocus_store::{keys, ChangeSet, ExtensionSettings};

pub use delivery::{deliver, Delivery};
pub use host::TabHost;

/// Everything that can wake the coordinator
#[derive(Debug, Clone)]
pub enum CoordinatorEvent {
    /// Runtime message from a page; `sender` is the tab it came from
    Message {
        sender: Option<TabId>,
        action: PageAction,
    },
    /// A tab's URL or load status changed
    TabUpdated {
        tab_id: TabId,
        change: TabChange,
        tab: TabInfo,
    },
    /// A tab was closed
    TabRemoved { tab_id: TabId },
    /// One or more store keys changed
    StorageChanged(ChangeSet),
}

pub struct FocusCoordinator<H> {
    host: H,
    settings: ExtensionSettings,
    watch_url_marker: String,
    state: FocusState,
}

impl<H: TabHost> FocusCoordinator<H> {
    pub fn new(host: H, settings: ExtensionSettings, config: &FocusConfig) -> Self {
        log::info!("Initializing focus coordinator");

        Self {
            host,
            settings,
            watch_url_marker: config.watch_url_marker.clone(),
            state: FocusState::Inactive,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// In-memory state, without consulting the store
    pub fn state(&self) -> FocusState {
        self.state
    }

    /// Process one event to completion
    pub fn handle_event(&mut self, event: CoordinatorEvent) -> Option<StatusResponse> {
        match event {
            CoordinatorEvent::Message { sender, action } => self.handle_message(sender, action),
            CoordinatorEvent::TabUpdated {
                tab_id,
                change,
                tab,
            } => {
                self.on_tab_updated(tab_id, &change, &tab);
                None
            }
            CoordinatorEvent::TabRemoved { tab_id } => {
                self.on_tab_removed(tab_id);
                None
            }
            CoordinatorEvent::StorageChanged(changes) => {
                self.on_settings_changed(&changes);
                None
            }
        }
    }

    /// Dispatch a page message; only `CheckStatus` produces a reply
    pub fn handle_message(
        &mut self,
        sender: Option<TabId>,
        action: PageAction,
    ) -> Option<StatusResponse> {
        match action {
            PageAction::VideoStarted => {
                match sender {
                    Some(tab_id) => self.on_video_started(tab_id),
                    None => log::debug!("Ignoring video start without a sender tab"),
                }
                None
            }
            PageAction::VideoEnded => {
                self.on_video_ended();
                None
            }
            PageAction::CheckStatus => Some(self.on_check_status(sender)),
        }
    }

    /// Reconcile with the durable record if memory looks unset.
    ///
    /// An active in-memory state is trusted as-is; it is never older than the
    /// stored one.
    pub fn ensure_state_loaded(&mut self) -> FocusState {
        if self.state.is_active() {
            return self.state;
        }

        match self.settings.focus_state() {
            Ok(Some(record)) => {
                let restored = FocusState::from(record);
                if restored.is_active() {
                    log::info!("Restored focus state from store: {:?}", restored);
                    self.state = restored;
                }
            }
            Ok(None) => {}
            Err(e) => log::warn!("Failed to read focus state: {}", e),
        }

        self.state
    }

    /// A page started playing: overlay every other tab and focus `tab_id`
    pub fn on_video_started(&mut self, tab_id: TabId) {
        self.ensure_state_loaded();

        if !self.settings.extension_enabled_or_default() {
            log::debug!("Extension disabled, ignoring video start in {}", tab_id);
            return;
        }

        let whitelist = self.settings.whitelisted_domains_or_default();
        let tabs = match self.host.query_tabs() {
            Ok(tabs) => tabs,
            Err(e) => {
                log::error!("Failed to enter focus mode for {}: {}", tab_id, e);
                return;
            }
        };

        for tab in tabs.iter().filter(|tab| tab.id != tab_id) {
            let Some(domain) = tab_domain(tab.url()) else {
                continue;
            };

            if is_domain_whitelisted(&domain, &whitelist) {
                deliver(&self.host, tab.id, TabCommand::RemoveOverlay);
            } else {
                deliver(&self.host, tab.id, TabCommand::ShowOverlay);
            }
        }

        self.state = FocusState::Active { tab: tab_id };
        if let Err(e) = self.settings.save_focus_state(self.state) {
            log::warn!("Failed to persist focus state: {}", e);
        }
        log::info!("Entered focus mode on {}", tab_id);
    }

    /// Clear focus and lift the overlay from every tab
    pub fn on_video_ended(&mut self) {
        self.ensure_state_loaded();
        self.reset();
    }

    pub fn on_check_status(&mut self, tab_id: Option<TabId>) -> StatusResponse {
        self.ensure_state_loaded();

        StatusResponse {
            is_focused_tab: tab_id.is_some_and(|id| self.state.is_focused(id)),
        }
    }

    pub fn on_tab_updated(&mut self, tab_id: TabId, change: &TabChange, tab: &TabInfo) {
        self.ensure_state_loaded();

        let Some(focused) = self.state.focused_tab() else {
            return;
        };

        if tab_id == focused {
            if let Some(url) = change.url.as_deref() {
                if !is_watch_page(url, &self.watch_url_marker) {
                    log::info!("Focused {} left the watch page", tab_id);
                    self.reset();
                }
            }
            return;
        }

        if change.is_load_complete() {
            self.overlay_loaded_tab(tab_id, tab);
        }
    }

    pub fn on_tab_removed(&mut self, tab_id: TabId) {
        self.ensure_state_loaded();

        if self.state.is_focused(tab_id) {
            log::info!("Focused {} was closed", tab_id);
            self.reset();
        }
    }

    pub fn on_settings_changed(&mut self, changes: &ChangeSet) {
        self.ensure_state_loaded();

        if changes.new_value(keys::EXTENSION_ENABLED) == Some(&serde_json::Value::Bool(false)) {
            log::info!("Extension disabled, leaving focus mode");
            self.reset();
        }
    }

    /// Another tab finished loading while focus is active
    fn overlay_loaded_tab(&mut self, tab_id: TabId, tab: &TabInfo) {
        let Some(domain) = tab_domain(tab.url()) else {
            return;
        };

        let whitelist = self.settings.whitelisted_domains_or_default();
        if !is_domain_whitelisted(&domain, &whitelist) {
            deliver(&self.host, tab_id, TabCommand::ShowOverlay);
        }
    }

    fn reset(&mut self) {
        if let Some(tab) = self.state.focused_tab() {
            log::info!("Leaving focus mode on {}", tab);
        }
        self.state = FocusState::Inactive;

        if let Err(e) = self.settings.clear_focus_state() {
            log::warn!("Failed to clear focus state: {}", e);
        }

        let tabs = match self.host.query_tabs() {
            Ok(tabs) => tabs,
            Err(e) => {
                log::warn!("Failed to list tabs for overlay removal: {}", e);
                return;
            }
        };

        for tab in &tabs {
            deliver(&self.host, tab.id, TabCommand::RemoveOverlay);
        }
    }
}
