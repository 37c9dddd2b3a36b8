//! Session routing for the websphinx browser extension.
//!
//! The background worker receives intents from the popup ("log in", "create
//! account", "change password", "list accounts", "commit"), forwards them to
//! the native sphinx host, and turns the host's answers into form-fill
//! instructions or popup replies.
//!
//! # Main Types
//!
//! - [`SessionRouter`] - State machine driven by UI requests and host responses
//! - [`SessionState`] - Credentials cached for the current site and account
//! - [`ExchangeTable`] - Correlates host responses with the request that caused them
//! - [`translate`] - Pure request / response mapping
//! - [`BackendChannel`], [`UiChannel`], [`InjectionSink`] - Outbound seams
//!
//! # Example
//!
//! ```ignore
//! use websphinx::{RouterConfig, SessionRouter};
//!
//! let mut router = SessionRouter::new(RouterConfig::default());
//! if let Some(outbound) = router.handle_ui_message(message) {
//!     router.dispatch(outbound, &mut channels)?;
//! }
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod exchange;
pub mod router;
pub mod session;
pub mod testing;
pub mod translate;

pub use channel::{BackendChannel, Channels, InjectionSink, UiChannel};
pub use config::RouterConfig;
pub use error::{ChannelError, Error, Result};
pub use exchange::{Exchange, ExchangeId, ExchangeTable, Flow, RotationPhase};
pub use router::{BackendEvent, Outbound, SessionRouter};
pub use session::{CredentialKind, SessionState};
pub use translate::UiAction;
pub use websphinx_protocol as protocol;
