use sharpfocus_coordinator::{CoordinatorEvent, FocusCoordinator, TabHost};
use sharpfocus_core::{
    FocusConfig, FocusError, FocusResult, FocusState, LoadStatus, PageAction, StatusResponse,
    TabChange, TabCommand, TabId, TabInfo,
};
use sharpfocus_store::{keys, ExtensionSettings, KeyValueStore, MemoryStore, SqliteStore};
use std::cell::RefCell;
use std::collections::HashSet;
use std::sync::Arc;

const WATCH_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

/// Browser double: tabs with optional listeners and an inbox of delivered
/// commands
#[derive(Default)]
struct FakeBrowser {
    tabs: RefCell<Vec<TabInfo>>,
    listening: RefCell<HashSet<TabId>>,
    restricted: RefCell<HashSet<TabId>>,
    inbox: RefCell<Vec<(TabId, TabCommand)>>,
}

impl FakeBrowser {
    fn open(&self, id: u64, url: &str) {
        self.tabs.borrow_mut().push(TabInfo::new(TabId(id), url));
    }

    fn open_restricted(&self, id: u64, url: &str) {
        self.open(id, url);
        self.restricted.borrow_mut().insert(TabId(id));
    }

    fn close(&self, id: u64) {
        self.tabs.borrow_mut().retain(|tab| tab.id != TabId(id));
        self.listening.borrow_mut().remove(&TabId(id));
    }

    fn tab(&self, id: u64) -> TabInfo {
        self.tabs
            .borrow()
            .iter()
            .find(|tab| tab.id == TabId(id))
            .cloned()
            .expect("tab is open")
    }

    fn commands_for(&self, id: u64) -> Vec<TabCommand> {
        self.inbox
            .borrow()
            .iter()
            .filter(|(tab, _)| *tab == TabId(id))
            .map(|(_, command)| *command)
            .collect()
    }

    fn clear_inbox(&self) {
        self.inbox.borrow_mut().clear();
    }
}

impl TabHost for FakeBrowser {
    fn query_tabs(&self) -> FocusResult<Vec<TabInfo>> {
        Ok(self.tabs.borrow().clone())
    }

    fn send_command(&self, tab_id: TabId, command: TabCommand) -> FocusResult<()> {
        if !self.listening.borrow().contains(&tab_id) {
            return Err(FocusError::unreachable(format!("no listener in {}", tab_id)));
        }
        self.inbox.borrow_mut().push((tab_id, command));
        Ok(())
    }

    fn inject_overlay_agent(&self, tab_id: TabId) -> FocusResult<()> {
        if self.restricted.borrow().contains(&tab_id) {
            return Err(FocusError::injection("cannot script this page"));
        }
        if !self.tabs.borrow().iter().any(|tab| tab.id == tab_id) {
            return Err(FocusError::unreachable("tab closed"));
        }
        self.listening.borrow_mut().insert(tab_id);
        Ok(())
    }
}

struct Harness {
    coordinator: FocusCoordinator<FakeBrowser>,
    settings: ExtensionSettings,
}

impl Harness {
    fn with_store(store: Arc<dyn KeyValueStore>) -> Self {
        let settings = ExtensionSettings::new(store);
        let coordinator =
            FocusCoordinator::new(FakeBrowser::default(), settings.clone(), &FocusConfig::default());
        Self {
            coordinator,
            settings,
        }
    }

    fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    fn browser(&self) -> &FakeBrowser {
        self.coordinator.host()
    }

    fn send(&mut self, sender: u64, action: PageAction) -> Option<StatusResponse> {
        self.coordinator.handle_event(CoordinatorEvent::Message {
            sender: Some(TabId(sender)),
            action,
        })
    }

    fn is_focused(&mut self, tab: u64) -> bool {
        self.send(tab, PageAction::CheckStatus)
            .expect("check status is answered")
            .is_focused_tab
    }

    fn set_enabled(&mut self, enabled: bool) {
        let mut rx = self.settings.subscribe();
        self.settings.set_extension_enabled(enabled).unwrap();
        while let Ok(changes) = rx.try_recv() {
            self.coordinator
                .handle_event(CoordinatorEvent::StorageChanged(changes));
        }
    }

    fn navigate(&mut self, tab: u64, url: &str) {
        let mut info = self.browser().tab(tab);
        info.url = Some(url.to_string());
        self.coordinator.handle_event(CoordinatorEvent::TabUpdated {
            tab_id: TabId(tab),
            change: TabChange::url(url),
            tab: info,
        });
    }

    fn finish_loading(&mut self, tab: u64) {
        let info = self.browser().tab(tab);
        self.coordinator.handle_event(CoordinatorEvent::TabUpdated {
            tab_id: TabId(tab),
            change: TabChange::status(LoadStatus::Complete),
            tab: info,
        });
    }

    fn close(&mut self, tab: u64) {
        self.browser().close(tab);
        self.coordinator
            .handle_event(CoordinatorEvent::TabRemoved { tab_id: TabId(tab) });
    }

    fn focus_record_present(&self) -> bool {
        self.settings.store().get(keys::FOCUS_STATE).unwrap().is_some()
    }

    /// Scenario A setup: tab 5 plays, tab 6 is whitelisted, tab 7 is not
    fn scenario_a(&mut self) {
        self.settings.add_whitelisted_domain("example.com").unwrap();
        self.browser().open(5, WATCH_URL);
        self.browser().open(6, "https://example.com/docs");
        self.browser().open(7, "https://other.com/");
        self.send(5, PageAction::VideoStarted);
    }

    fn assert_fully_reset(&mut self, open_tabs: &[u64]) {
        for &tab in open_tabs {
            assert!(
                self.browser()
                    .commands_for(tab)
                    .contains(&TabCommand::RemoveOverlay),
                "tab {} did not get remove-overlay",
                tab
            );
            assert!(!self.is_focused(tab));
        }
        assert_eq!(self.coordinator.state(), FocusState::Inactive);
        assert!(!self.focus_record_present());
    }
}

#[test]
fn test_scenario_a_overlays_non_whitelisted_tabs() {
    let mut h = Harness::new();
    h.scenario_a();

    assert!(h.browser().commands_for(5).is_empty());
    assert_eq!(h.browser().commands_for(6), vec![TabCommand::RemoveOverlay]);
    assert_eq!(h.browser().commands_for(7), vec![TabCommand::ShowOverlay]);

    assert!(h.is_focused(5));
    assert!(!h.is_focused(7));
    assert!(h.focus_record_present());
}

#[test]
fn test_scenario_b_video_end_resets_everything() {
    let mut h = Harness::new();
    h.scenario_a();
    h.browser().clear_inbox();

    h.send(5, PageAction::VideoEnded);

    h.assert_fully_reset(&[5, 6, 7]);
}

#[test]
fn test_scenario_c_closing_focused_tab_resets() {
    let mut h = Harness::new();
    h.scenario_a();
    h.browser().clear_inbox();

    h.close(5);

    h.assert_fully_reset(&[6, 7]);
}

#[test]
fn test_scenario_d_disable_resets_and_blocks_new_focus() {
    let mut h = Harness::new();
    h.scenario_a();
    h.browser().clear_inbox();

    h.set_enabled(false);
    h.assert_fully_reset(&[5, 6, 7]);

    h.browser().clear_inbox();
    h.send(5, PageAction::VideoStarted);
    assert!(!h.is_focused(5));
    assert!(h.browser().commands_for(7).is_empty());

    h.set_enabled(true);
    h.send(5, PageAction::VideoStarted);
    assert!(h.is_focused(5));
    assert_eq!(h.browser().commands_for(7), vec![TabCommand::ShowOverlay]);
}

#[test]
fn test_scenario_e_navigating_off_watch_page_resets() {
    let mut h = Harness::new();
    h.scenario_a();
    h.browser().clear_inbox();

    h.navigate(5, "https://www.youtube.com/feed/subscriptions");

    h.assert_fully_reset(&[5, 6, 7]);
}

#[test]
fn test_focused_tab_moving_to_another_video_keeps_focus() {
    let mut h = Harness::new();
    h.scenario_a();
    h.browser().clear_inbox();

    h.navigate(5, "https://www.youtube.com/watch?v=another");

    assert!(h.is_focused(5));
    assert!(h.browser().inbox.borrow().is_empty());
}

#[test]
fn test_status_change_on_focused_tab_is_not_navigation() {
    let mut h = Harness::new();
    h.scenario_a();

    h.finish_loading(5);

    assert!(h.is_focused(5));
}

#[test]
fn test_other_tab_finishing_load_gets_overlay() {
    let mut h = Harness::new();
    h.scenario_a();
    h.browser().clear_inbox();
    h.browser().open(8, "https://distracting.example.net/");
    h.browser().open(9, "https://sub.example.com/");

    h.finish_loading(8);
    h.finish_loading(9);

    assert_eq!(h.browser().commands_for(8), vec![TabCommand::ShowOverlay]);
    // Whitelisted tabs are left alone on load
    assert!(h.browser().commands_for(9).is_empty());
}

#[test]
fn test_other_tab_url_change_alone_does_nothing() {
    let mut h = Harness::new();
    h.scenario_a();
    h.browser().clear_inbox();

    h.navigate(7, "https://other.com/next");

    assert!(h.browser().commands_for(7).is_empty());
    assert!(h.is_focused(5));
}

#[test]
fn test_tab_events_ignored_while_inactive() {
    let mut h = Harness::new();
    h.browser().open(7, "https://other.com/");

    h.finish_loading(7);
    h.close(7);

    assert!(h.browser().inbox.borrow().is_empty());
    assert_eq!(h.coordinator.state(), FocusState::Inactive);
}

#[test]
fn test_closing_other_tab_keeps_focus() {
    let mut h = Harness::new();
    h.scenario_a();

    h.close(7);

    assert!(h.is_focused(5));
    assert!(h.focus_record_present());
}

#[test]
fn test_video_end_when_inactive_is_harmless() {
    let mut h = Harness::new();
    h.browser().open(1, "https://other.com/");

    h.send(1, PageAction::VideoEnded);
    h.send(1, PageAction::VideoEnded);

    assert_eq!(h.coordinator.state(), FocusState::Inactive);
    assert!(!h.focus_record_present());
}

#[test]
fn test_unreachable_tab_does_not_abort_broadcast() {
    let mut h = Harness::new();
    h.browser().open(5, WATCH_URL);
    h.browser().open_restricted(6, "https://addons.mozilla.org/");
    h.browser().open(7, "https://other.com/");

    h.send(5, PageAction::VideoStarted);

    assert!(h.browser().commands_for(6).is_empty());
    assert_eq!(h.browser().commands_for(7), vec![TabCommand::ShowOverlay]);
    assert!(h.is_focused(5));
}

#[test]
fn test_restart_recovers_focus_from_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");

    {
        let mut h = Harness::with_store(Arc::new(SqliteStore::open(&path).unwrap()));
        h.browser().open(5, WATCH_URL);
        h.send(5, PageAction::VideoStarted);
    }

    // Fresh coordinator, as after the background process was unloaded
    let mut h = Harness::with_store(Arc::new(SqliteStore::open(&path).unwrap()));
    assert_eq!(h.coordinator.state(), FocusState::Inactive);
    assert!(h.is_focused(5));

    h.browser().open(5, WATCH_URL);
    h.browser().open(7, "https://other.com/");
    h.close(5);
    h.assert_fully_reset(&[7]);
}

#[test]
fn test_restart_then_close_focused_tab() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    {
        let mut h = Harness::with_store(store.clone());
        h.browser().open(5, WATCH_URL);
        h.send(5, PageAction::VideoStarted);
    }

    let mut h = Harness::with_store(store);
    h.browser().open(6, "https://other.com/");
    h.close(5);

    assert!(!h.focus_record_present());
    assert_eq!(h.browser().commands_for(6), vec![TabCommand::RemoveOverlay]);
}

#[test]
fn test_reconciliation_is_idempotent() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    store
        .set(
            keys::FOCUS_STATE,
            serde_json::json!({ "isActive": true, "tabId": 12 }),
        )
        .unwrap();

    let mut h = Harness::with_store(store);
    let first = h.coordinator.ensure_state_loaded();
    let second = h.coordinator.ensure_state_loaded();

    assert_eq!(first, FocusState::Active { tab: TabId(12) });
    assert_eq!(first, second);
}

#[test]
fn test_populated_memory_is_trusted_over_store() {
    let mut h = Harness::new();
    h.browser().open(5, WATCH_URL);
    h.send(5, PageAction::VideoStarted);

    h.settings
        .store()
        .set(
            keys::FOCUS_STATE,
            serde_json::json!({ "isActive": true, "tabId": 99 }),
        )
        .unwrap();

    assert!(h.is_focused(5));
    assert!(!h.is_focused(99));
}

#[test]
fn test_inactive_record_is_not_adopted() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    store
        .set(
            keys::FOCUS_STATE,
            serde_json::json!({ "isActive": false, "tabId": 3 }),
        )
        .unwrap();

    let mut h = Harness::with_store(store);
    assert!(!h.is_focused(3));
}

#[test]
fn test_corrupt_record_is_ignored() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    store
        .set(keys::FOCUS_STATE, serde_json::json!("garbage"))
        .unwrap();

    let mut h = Harness::with_store(store);
    assert!(!h.is_focused(3));
    assert_eq!(h.coordinator.state(), FocusState::Inactive);
}

#[test]
fn test_new_video_in_other_tab_moves_focus() {
    let mut h = Harness::new();
    h.browser().open(5, WATCH_URL);
    h.browser().open(8, "https://www.youtube.com/watch?v=second");
    h.send(5, PageAction::VideoStarted);
    h.browser().clear_inbox();

    h.send(8, PageAction::VideoStarted);

    assert!(h.is_focused(8));
    assert!(!h.is_focused(5));
    assert_eq!(h.browser().commands_for(5), vec![TabCommand::ShowOverlay]);
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Started,
    Ended,
    NavigatedAway,
    Closed,
    Disabled,
    Enabled,
}

const STEPS: [Step; 6] = [
    Step::Started,
    Step::Ended,
    Step::NavigatedAway,
    Step::Closed,
    Step::Disabled,
    Step::Enabled,
];

fn all_sequences(max_len: usize) -> Vec<Vec<Step>> {
    let mut out: Vec<Vec<Step>> = vec![Vec::new()];
    let mut frontier: Vec<Vec<Step>> = vec![Vec::new()];
    for _ in 0..max_len {
        let mut next = Vec::new();
        for seq in &frontier {
            for step in STEPS {
                let mut extended = seq.clone();
                extended.push(step);
                next.push(extended);
            }
        }
        out.extend(next.iter().cloned());
        frontier = next;
    }
    out
}

#[test]
fn test_focus_follows_last_terminal_signal() {
    for sequence in all_sequences(4) {
        let mut h = Harness::new();
        h.browser().open(7, "https://other.com/");
        let mut enabled = true;
        let mut expected = false;

        for step in &sequence {
            match step {
                Step::Started => {
                    if !h.browser().tabs.borrow().iter().any(|t| t.id == TabId(5)) {
                        h.browser().open(5, WATCH_URL);
                    }
                    h.send(5, PageAction::VideoStarted);
                    expected = enabled;
                }
                Step::Ended => {
                    h.send(5, PageAction::VideoEnded);
                    expected = false;
                }
                Step::NavigatedAway => {
                    if h.browser().tabs.borrow().iter().any(|t| t.id == TabId(5)) {
                        h.navigate(5, "https://www.youtube.com/");
                        expected = false;
                    }
                }
                Step::Closed => {
                    h.close(5);
                    expected = false;
                }
                Step::Disabled => {
                    h.set_enabled(false);
                    enabled = false;
                    expected = false;
                }
                Step::Enabled => {
                    h.set_enabled(true);
                    enabled = true;
                }
            }
        }

        assert_eq!(
            h.coordinator.state().is_active(),
            expected,
            "sequence {:?}",
            sequence
        );
        assert_eq!(h.focus_record_present(), expected, "sequence {:?}", sequence);
    }
}
