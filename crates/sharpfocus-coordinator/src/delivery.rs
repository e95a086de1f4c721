//! Best-effort command delivery to tabs that may have no listener yet

use crate::host::TabHost;
use sharpfocus_core::{FocusError, TabCommand, TabId};

/// How a command reached (or failed to reach) a tab
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// A listener was already running
    Direct,
    /// The overlay agent had to be injected first
    AfterInjection,
    /// The tab could not be scripted; the command was dropped
    Dropped,
}

impl Delivery {
    pub fn delivered(&self) -> bool {
        !matches!(self, Delivery::Dropped)
    }
}

/// Send `command` to `tab_id`; on failure inject the overlay agent and retry
/// once. Never fails: an unreachable tab is logged and skipped, and any other
/// failure is dropped with a warning.
pub fn deliver<H: TabHost + ?Sized>(host: &H, tab_id: TabId, command: TabCommand) -> Delivery {
    let first = match host.send_command(tab_id, command) {
        Ok(()) => return Delivery::Direct,
        Err(e) => e,
    };
    log::trace!("{} has no listener for {:?}: {}", tab_id, command, first);

    if let Err(e) = host.inject_overlay_agent(tab_id) {
        return dropped(tab_id, command, &e);
    }

    match host.send_command(tab_id, command) {
        Ok(()) => Delivery::AfterInjection,
        Err(e) => dropped(tab_id, command, &e),
    }
}

fn dropped(tab_id: TabId, command: TabCommand, error: &FocusError) -> Delivery {
    if error.is_unreachable() {
        log::debug!("Dropping {:?} for {}: {}", command, tab_id, error);
    } else {
        log::warn!("Dropping {:?} for {}: {}", command, tab_id, error);
    }
    Delivery::Dropped
}

#[cfg(test)]
mod tests {
    use super::*;
    use sharpfocus_core::{FocusResult, TabInfo};
    use std::cell::{Cell, RefCell};
    use std::collections::HashSet;

    #[derive(Default)]
    struct ScriptedHost {
        listening: RefCell<HashSet<TabId>>,
        injectable: HashSet<TabId>,
        deaf_after_injection: HashSet<TabId>,
        broken_injection: bool,
        sends: Cell<usize>,
        injections: Cell<usize>,
    }

    impl TabHost for ScriptedHost {
        fn query_tabs(&self) -> FocusResult<Vec<TabInfo>> {
            Ok(Vec::new())
        }

        fn send_command(&self, tab_id: TabId, _command: TabCommand) -> FocusResult<()> {
            self.sends.set(self.sends.get() + 1);
            if self.listening.borrow().contains(&tab_id) {
                Ok(())
            } else {
                Err(FocusError::unreachable("no listener"))
            }
        }

        fn inject_overlay_agent(&self, tab_id: TabId) -> FocusResult<()> {
            self.injections.set(self.injections.get() + 1);
            if self.broken_injection {
                return Err(FocusError::messaging("extension context invalidated"));
            }
            if !self.injectable.contains(&tab_id) {
                return Err(FocusError::injection("restricted page"));
            }
            if !self.deaf_after_injection.contains(&tab_id) {
                self.listening.borrow_mut().insert(tab_id);
            }
            Ok(())
        }
    }

    #[test]
    fn test_direct_delivery_skips_injection() {
        let host = ScriptedHost::default();
        host.listening.borrow_mut().insert(TabId(1));

        assert_eq!(deliver(&host, TabId(1), TabCommand::ShowOverlay), Delivery::Direct);
        assert_eq!(host.injections.get(), 0);
        assert_eq!(host.sends.get(), 1);
    }

    #[test]
    fn test_injects_then_retries_once() {
        let host = ScriptedHost {
            injectable: [TabId(2)].into_iter().collect(),
            ..Default::default()
        };

        let outcome = deliver(&host, TabId(2), TabCommand::ShowOverlay);
        assert_eq!(outcome, Delivery::AfterInjection);
        assert!(outcome.delivered());
        assert_eq!(host.injections.get(), 1);
        assert_eq!(host.sends.get(), 2);
    }

    #[test]
    fn test_restricted_tab_is_dropped() {
        let host = ScriptedHost::default();

        let outcome = deliver(&host, TabId(3), TabCommand::RemoveOverlay);
        assert_eq!(outcome, Delivery::Dropped);
        assert_eq!(host.sends.get(), 1);
    }

    #[test]
    fn test_second_failure_is_dropped_without_more_retries() {
        let host = ScriptedHost {
            injectable: [TabId(4)].into_iter().collect(),
            deaf_after_injection: [TabId(4)].into_iter().collect(),
            ..Default::default()
        };

        assert_eq!(deliver(&host, TabId(4), TabCommand::ShowOverlay), Delivery::Dropped);
        assert_eq!(host.sends.get(), 2);
        assert_eq!(host.injections.get(), 1);
    }

    #[test]
    fn test_unexpected_injection_error_is_dropped() {
        let host = ScriptedHost {
            injectable: [TabId(6)].into_iter().collect(),
            broken_injection: true,
            ..Default::default()
        };

        assert_eq!(deliver(&host, TabId(6), TabCommand::RemoveOverlay), Delivery::Dropped);
        assert_eq!(host.sends.get(), 1);
        assert_eq!(host.injections.get(), 1);
    }
}
