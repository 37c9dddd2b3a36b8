//! Router configuration.
//!
//! The background worker reads this from `chrome.storage.local` under
//! [`RouterConfig::STORAGE_KEY`]. Every field is optional on the wire.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use websphinx_protocol::NATIVE_APP_NAME;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RouterConfig {
	/// Native messaging host to connect to.
	pub native_app: String,
	/// Report host failures and aborted rotations to the popup.
	pub notify_ui_on_failure: bool,
	/// Attach exchange ids to host requests. Only enable for hosts that echo `id`.
	pub send_request_ids: bool,
	/// Upper bound on unanswered host requests; the oldest is evicted first.
	pub max_pending_exchanges: usize,
	/// `tracing` filter directive for the worker's console output.
	pub log_filter: String,
}

impl RouterConfig {
	pub const STORAGE_KEY: &'static str = "websphinx_config";

	/// Parses a stored config object, filling gaps with defaults.
	pub fn from_value(value: Value) -> Result<Self> {
		if value.is_null() {
			return Ok(Self::default());
		}
		let config: Self = serde_json::from_value(value)?;
		Ok(config.normalized())
	}

	fn normalized(mut self) -> Self {
		self.max_pending_exchanges = self.max_pending_exchanges.max(1);
		if self.native_app.trim().is_empty() {
			self.native_app = NATIVE_APP_NAME.to_string();
		}
		self
	}
}

impl Default for RouterConfig {
	fn default() -> Self {
		Self {
			native_app: NATIVE_APP_NAME.to_string(),
			notify_ui_on_failure: false,
			send_request_ids: false,
			max_pending_exchanges: 16,
			log_filter: "info".to_string(),
		}
	}
}
