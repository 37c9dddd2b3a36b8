//! Messages exchanged with the popup and content script.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Operation requested by the UI, mirrored as `cmd` towards the native host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
	Login,
	Create,
	Change,
	List,
	Commit,
}

impl Action {
	pub const ALL: [Action; 5] = [
		Action::Login,
		Action::Create,
		Action::Change,
		Action::List,
		Action::Commit,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			Action::Login => "login",
			Action::Create => "create",
			Action::Change => "change",
			Action::List => "list",
			Action::Commit => "commit",
		}
	}

	/// Returns `true` for actions whose responses carry a password.
	pub fn yields_credential(self) -> bool {
		matches!(self, Action::Login | Action::Create | Action::Change)
	}
}

impl fmt::Display for Action {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Returned when an action or command string is outside the supported set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAction(pub String);

impl fmt::Display for UnknownAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "unknown action `{}`", self.0)
	}
}

impl std::error::Error for UnknownAction {}

impl FromStr for Action {
	type Err = UnknownAction;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Action::ALL
			.into_iter()
			.find(|action| action.as_str() == s)
			.ok_or_else(|| UnknownAction(s.to_string()))
	}
}

/// Whether the UI wants the credential typed into the focused field
/// ([`Manual`](Self::Manual)) or wants the worker to drive the whole flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
	#[default]
	Auto,
	Manual,
}

impl Mode {
	pub fn is_manual(self) -> bool {
		self == Mode::Manual
	}
}

/// Request posted by the popup or content script.
///
/// `action` stays a raw string so an unsupported value can be reported
/// verbatim instead of failing the whole message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiRequest {
	pub action: String,
	#[serde(default)]
	pub mode: Mode,
	pub site: String,
	/// Account name; absent for `list`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	/// Character classes for `create`, any of `u`, `l`, `s`, `d`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub rules: Option<String>,
	/// Password length for `create`; form fields deliver it as a string.
	#[serde(
		default,
		deserialize_with = "lenient_size",
		skip_serializing_if = "Option::is_none"
	)]
	pub size: Option<u32>,
}

impl UiRequest {
	pub fn new(action: Action, mode: Mode, site: impl Into<String>) -> Self {
		Self {
			action: action.as_str().to_string(),
			mode,
			site: site.into(),
			name: None,
			rules: None,
			size: None,
		}
	}

	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());
		self
	}

	pub fn with_rules(mut self, rules: impl Into<String>, size: u32) -> Self {
		self.rules = Some(rules.into());
		self.size = Some(size);
		self
	}

	/// Account name, empty when the request carries none.
	pub fn user(&self) -> &str {
		self.name.as_deref().unwrap_or_default()
	}
}

fn lenient_size<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum RawSize {
		Number(u32),
		Text(String),
	}

	match Option::<RawSize>::deserialize(deserializer)? {
		None => Ok(None),
		Some(RawSize::Number(n)) => Ok(Some(n)),
		Some(RawSize::Text(text)) if text.trim().is_empty() => Ok(None),
		Some(RawSize::Text(text)) => text
			.trim()
			.parse()
			.map(Some)
			.map_err(serde::de::Error::custom),
	}
}

/// Status tag for [`StatusReply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplyStatus {
	Error,
}

/// `{status: "ERROR", error}` sent to the UI when an exchange cannot complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReply {
	pub status: ReplyStatus,
	pub error: String,
}

/// Message posted back to the popup / content script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UiReply {
	/// Error indicator.
	Status(StatusReply),
	/// Raw native host response, forwarded untouched (`list`, `commit`).
	Forward(Value),
}

impl UiReply {
	pub fn error(message: impl Into<String>) -> Self {
		UiReply::Status(StatusReply {
			status: ReplyStatus::Error,
			error: message.into(),
		})
	}
}
