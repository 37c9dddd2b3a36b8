//! Wire types for the websphinx browser extension.
//!
//! The background worker sits between two message channels and one script sink:
//!
//! 1. The popup / content script sends a [`UiRequest`] over a runtime port
//! 2. The worker sends a [`BackendRequest`] to the native messaging host
//! 3. The host answers with a [`BackendResponse`]
//! 4. The worker either runs an [`Injection`] in the page or answers the
//!    popup with a [`UiReply`]
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! - **Pure data**: no routing decisions, only shapes and their (de)serialization
//! - **Field-exact**: optional fields are omitted, never sent as `null`, since
//!   field presence is the compatibility contract with the popup and the host
//!
//! Routing lives in `websphinx-core`.

pub mod injection;
pub mod native;
pub mod ui;

pub use injection::*;
pub use native::*;
pub use ui::*;

/// Native messaging host name registered by the sphinx client.
pub const NATIVE_APP_NAME: &str = "websphinx";
