//! Messages exchanged with the native messaging host.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ui::{Action, Mode};

/// Request posted to the native host.
///
/// Never carries a password: the host derives credentials itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendRequest {
	pub cmd: Action,
	pub mode: Mode,
	pub site: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub rules: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub size: Option<u32>,
	/// Exchange id, only attached when the host is known to echo it.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<u64>,
	/// Fields echoed by the host that are carried into a follow-up request.
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

impl BackendRequest {
	pub fn new(cmd: Action, mode: Mode, site: impl Into<String>) -> Self {
		Self {
			cmd,
			mode,
			site: site.into(),
			name: None,
			rules: None,
			size: None,
			id: None,
			extra: Map::new(),
		}
	}

	/// Account name, empty when the request carries none.
	pub fn user(&self) -> &str {
		self.name.as_deref().unwrap_or_default()
	}
}

/// Message received from the native host.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendResponse {
	pub results: Results,
}

/// Payload of a [`BackendResponse`].
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Results {
	/// Bare status string; `"fail"` is the host's failure indicator.
	Status(String),
	Record(ResultRecord),
}

impl BackendResponse {
	pub const FAIL: &'static str = "fail";

	pub fn is_failure(&self) -> bool {
		matches!(&self.results, Results::Status(status) if status == Self::FAIL)
	}

	pub fn record(&self) -> Option<&ResultRecord> {
		match &self.results {
			Results::Record(record) => Some(record),
			Results::Status(_) => None,
		}
	}
}

/// Result record echoed by the host: the request fields plus the outcome.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
	/// Kept as text so unknown commands can be reported rather than rejected.
	pub cmd: String,
	#[serde(default)]
	pub mode: Mode,
	pub site: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub password: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<u64>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

impl ResultRecord {
	pub fn action(&self) -> Option<Action> {
		self.cmd.parse().ok()
	}

	/// Account name, empty when the host echoed none.
	pub fn user(&self) -> &str {
		self.name.as_deref().unwrap_or_default()
	}

	pub fn password(&self) -> &str {
		self.password.as_deref().unwrap_or_default()
	}
}

impl std::fmt::Debug for ResultRecord {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ResultRecord")
			.field("cmd", &self.cmd)
			.field("mode", &self.mode)
			.field("site", &self.site)
			.field("name", &self.name)
			.field("password", &self.password.as_ref().map(|_| "<redacted>"))
			.field("id", &self.id)
			.field("extra", &self.extra.keys().collect::<Vec<_>>())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn backend_request_omits_absent_fields() {
		let request = BackendRequest::new(Action::List, Mode::Auto, "example.com");
		let json = serde_json::to_value(&request).unwrap();
		assert_eq!(
			json,
			json!({"cmd": "list", "mode": "auto", "site": "example.com"})
		);
	}

	#[test]
	fn failure_indicator_is_detected() {
		let response: BackendResponse =
			serde_json::from_value(json!({"results": "fail"})).unwrap();
		assert!(response.is_failure());
		assert!(response.record().is_none());
	}

	#[test]
	fn other_status_strings_are_not_failures() {
		let response: BackendResponse =
			serde_json::from_value(json!({"results": "busy"})).unwrap();
		assert!(!response.is_failure());
	}

	#[test]
	fn result_record_keeps_unknown_fields() {
		let response: BackendResponse = serde_json::from_value(json!({
			"results": {
				"cmd": "login",
				"mode": "auto",
				"site": "example.com",
				"name": "alice",
				"password": "hunter2",
				"rules": "ulsd",
				"size": 0,
			}
		}))
		.unwrap();
		let record = response.record().unwrap();
		assert_eq!(record.action(), Some(Action::Login));
		assert_eq!(record.password(), "hunter2");
		assert_eq!(record.extra.get("rules"), Some(&json!("ulsd")));
		assert_eq!(record.extra.get("size"), Some(&json!(0)));
	}

	#[test]
	fn result_record_debug_hides_password() {
		let record: ResultRecord = serde_json::from_value(json!({
			"cmd": "create",
			"site": "example.com",
			"password": "hunter2",
		}))
		.unwrap();
		let debug = format!("{record:?}");
		assert!(!debug.contains("hunter2"));
		assert!(debug.contains("<redacted>"));
	}
}
