//! Scripted browsing sessions

use crate::browser::SimBrowser;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sharpfocus_core::{FocusSettings, TabId, Theme};
use std::path::Path;
use tracing::info;

fn yes() -> bool {
    true
}

/// One user or browser action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Open a tab. `pending` leaves it loading until a `load_complete` step.
    OpenTab {
        tab: TabId,
        url: String,
        #[serde(default)]
        pending: bool,
        /// Off for tabs that predate the extension
        #[serde(default = "yes")]
        content_scripts: bool,
    },
    Navigate {
        tab: TabId,
        url: String,
        #[serde(default)]
        pending: bool,
    },
    Reload {
        tab: TabId,
        #[serde(default)]
        pending: bool,
    },
    LoadComplete {
        tab: TabId,
    },
    Play {
        tab: TabId,
    },
    Pause {
        tab: TabId,
    },
    /// Let playback run on
    TimeUpdate {
        tab: TabId,
        seconds: f64,
    },
    EndVideo {
        tab: TabId,
    },
    CloseTab {
        tab: TabId,
    },
    SetEnabled {
        enabled: bool,
    },
    ToggleExtension,
    WhitelistAdd {
        domain: String,
    },
    WhitelistRemove {
        domain: String,
    },
    SetTheme {
        theme: Theme,
    },
    SaveSettings {
        #[serde(default)]
        whitelisted_domains: Vec<String>,
        #[serde(default)]
        focus_settings: FocusSettings,
    },
    /// The browser unloads and later restarts the background process
    RestartBackground,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse scenario {}", path.display()))
    }

    /// Watch a video with two other tabs open, one of them whitelisted, then
    /// let it play to the end
    pub fn demo() -> Self {
        Self {
            name: "demo".to_string(),
            steps: vec![
                Step::WhitelistAdd {
                    domain: "example.com".to_string(),
                },
                Step::OpenTab {
                    tab: TabId(6),
                    url: "https://example.com/".to_string(),
                    pending: false,
                    content_scripts: true,
                },
                Step::OpenTab {
                    tab: TabId(7),
                    url: "https://other.com/".to_string(),
                    pending: false,
                    content_scripts: true,
                },
                Step::OpenTab {
                    tab: TabId(5),
                    url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
                    pending: false,
                    content_scripts: true,
                },
                Step::Play { tab: TabId(5) },
                Step::TimeUpdate {
                    tab: TabId(5),
                    seconds: 300.0,
                },
                Step::EndVideo { tab: TabId(5) },
            ],
        }
    }

    pub fn run(&self, browser: &mut SimBrowser) -> Result<()> {
        info!(
            "Running scenario '{}' ({} steps)",
            self.name,
            self.steps.len()
        );

        for (index, step) in self.steps.iter().enumerate() {
            info!("Step {}: {:?}", index + 1, step);
            apply(browser, step).with_context(|| format!("Step {} failed", index + 1))?;
        }
        Ok(())
    }
}

fn apply(browser: &mut SimBrowser, step: &Step) -> Result<()> {
    match step {
        Step::OpenTab {
            tab,
            url,
            pending,
            content_scripts,
        } => browser.open_tab(*tab, url, *pending, *content_scripts)?,
        Step::Navigate { tab, url, pending } => browser.navigate(*tab, url, *pending)?,
        Step::Reload { tab, pending } => browser.reload(*tab, *pending)?,
        Step::LoadComplete { tab } => browser.finish_loading(*tab)?,
        Step::Play { tab } => browser.play(*tab)?,
        Step::Pause { tab } => browser.pause(*tab)?,
        Step::TimeUpdate { tab, seconds } => browser.advance(*tab, *seconds)?,
        Step::EndVideo { tab } => browser.end_video(*tab)?,
        Step::CloseTab { tab } => browser.close_tab(*tab)?,
        Step::SetEnabled { enabled } => browser.settings().set_extension_enabled(*enabled)?,
        Step::ToggleExtension => {
            let enabled = browser.settings().toggle_extension()?;
            info!("Extension {}", if enabled { "enabled" } else { "disabled" });
        }
        Step::WhitelistAdd { domain } => {
            browser.settings().add_whitelisted_domain(domain)?;
        }
        Step::WhitelistRemove { domain } => {
            browser.settings().remove_whitelisted_domain(domain)?;
        }
        Step::SetTheme { theme } => browser.settings().set_theme(*theme)?,
        Step::SaveSettings {
            whitelisted_domains,
            focus_settings,
        } => browser
            .settings()
            .save_settings(whitelisted_domains, focus_settings)?,
        Step::RestartBackground => browser.restart_background(),
    }

    // Deliver the store changes a settings step produced
    browser.pump();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sharpfocus_core::FocusConfig;
    use sharpfocus_store::{ExtensionSettings, MemoryStore};
    use std::sync::Arc;

    fn browser() -> SimBrowser {
        let settings = ExtensionSettings::new(Arc::new(MemoryStore::new()));
        SimBrowser::new(settings, FocusConfig::default())
    }

    #[test]
    fn test_parse_steps() {
        let scenario: Scenario = serde_json::from_value(json!({
            "steps": [
                { "step": "open_tab", "tab": 5, "url": "https://www.youtube.com/watch?v=a" },
                { "step": "open_tab", "tab": 9, "url": "https://x.org/", "content_scripts": false },
                { "step": "time_update", "tab": 5, "seconds": 12.5 },
                { "step": "set_theme", "theme": "dark" },
                { "step": "toggle_extension" },
                { "step": "restart_background" }
            ]
        }))
        .unwrap();

        assert_eq!(scenario.steps.len(), 6);
        assert_eq!(
            scenario.steps[0],
            Step::OpenTab {
                tab: TabId(5),
                url: "https://www.youtube.com/watch?v=a".to_string(),
                pending: false,
                content_scripts: true,
            }
        );
        assert!(matches!(
            scenario.steps[1],
            Step::OpenTab {
                content_scripts: false,
                ..
            }
        ));
        assert_eq!(scenario.steps[3], Step::SetTheme { theme: Theme::Dark });
    }

    #[test]
    fn test_unknown_step_is_rejected() {
        let result: serde_json::Result<Scenario> =
            serde_json::from_value(json!({ "steps": [{ "step": "teleport" }] }));
        assert!(result.is_err());
    }

    #[test]
    fn test_demo_ends_with_everything_restored() {
        let mut browser = browser();
        Scenario::demo().run(&mut browser).unwrap();

        let summary = browser.summary();
        assert_eq!(summary.focused_tab, None);
        assert_eq!(summary.persisted_focus, None);
        assert!(summary.tabs.iter().all(|tab| tab.overlay.is_none()));
        assert!(summary.tabs.iter().all(|tab| !tab.scroll_locked));
    }

    #[test]
    fn test_failed_step_reports_its_position() {
        let mut browser = browser();
        let scenario = Scenario {
            name: "broken".to_string(),
            steps: vec![Step::ToggleExtension, Step::CloseTab { tab: TabId(1) }],
        };

        let err = scenario.run(&mut browser).unwrap_err();
        assert!(err.to_string().contains("Step 2"));
    }

    #[test]
    fn test_whitelisting_mid_session_applies_to_new_loads() {
        let mut browser = browser();
        let scenario = Scenario {
            name: String::new(),
            steps: vec![
                Step::OpenTab {
                    tab: TabId(5),
                    url: "https://www.youtube.com/watch?v=a".to_string(),
                    pending: false,
                    content_scripts: true,
                },
                Step::Play { tab: TabId(5) },
                Step::WhitelistAdd {
                    domain: "docs.rs".to_string(),
                },
                Step::OpenTab {
                    tab: TabId(8),
                    url: "https://docs.rs/serde".to_string(),
                    pending: false,
                    content_scripts: true,
                },
                Step::OpenTab {
                    tab: TabId(9),
                    url: "https://crates.io/".to_string(),
                    pending: false,
                    content_scripts: true,
                },
            ],
        };

        scenario.run(&mut browser).unwrap();

        assert!(!browser.has_overlay(TabId(8)));
        assert!(browser.has_overlay(TabId(9)));
    }
}
