//! SharpFocus Core Library
//!
//! This crate provides shared types, errors, configuration, the message
//! protocol and domain matching used by every SharpFocus component.

pub mod config;
pub mod domain;
pub mod error;
pub mod protocol;
pub mod types;

pub use config::FocusConfig;
pub use error::{FocusError, FocusResult};
pub use protocol::{PageAction, StatusResponse, TabCommand};
pub use types::{FocusSettings, FocusState, LoadStatus, TabChange, TabId, TabInfo, Theme};
