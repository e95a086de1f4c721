//! The browser as seen from the background process

use sharpfocus_core::{FocusResult, TabCommand, TabId, TabInfo};

/// Tab facilities the coordinator needs from the browser.
///
/// Failures of `send_command` and `inject_overlay_agent` are expected for
/// privileged pages and for tabs that close mid-operation; callers go through
/// [`crate::deliver`] rather than handling them one by one.
pub trait TabHost {
    /// All currently open tabs, across windows
    fn query_tabs(&self) -> FocusResult<Vec<TabInfo>>;

    /// Deliver a command to the listeners running in `tab_id`
    fn send_command(&self, tab_id: TabId, command: TabCommand) -> FocusResult<()>;

    /// Inject the overlay agent script so the tab has a listener
    fn inject_overlay_agent(&self, tab_id: TabId) -> FocusResult<()>;
}

impl<T: TabHost + ?Sized> TabHost for &T {
    fn query_tabs(&self) -> FocusResult<Vec<TabInfo>> {
        (**self).query_tabs()
    }

    fn send_command(&self, tab_id: TabId, command: TabCommand) -> FocusResult<()> {
        (**self).send_command(tab_id, command)
    }

    fn inject_overlay_agent(&self, tab_id: TabId) -> FocusResult<()> {
        (**self).inject_overlay_agent(tab_id)
    }
}
