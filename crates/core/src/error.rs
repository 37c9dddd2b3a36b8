//! Error types for session routing.

use thiserror::Error;
use websphinx_protocol::UnknownAction;

use crate::config::RouterConfig;
use crate::translate::MAX_SIZE;

/// Result type alias for routing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reasons an exchange could not be completed.
///
/// None of these are fatal to the worker: each ends the current exchange only.
#[derive(Debug, Error)]
pub enum Error {
	/// The native messaging port reported an error or disconnected.
	#[error("native host channel error: {0}")]
	Transport(String),

	/// The host answered `{"results": "fail"}`.
	#[error("native host reported failure")]
	BackendFailure,

	/// A change response arrived for a site/account the session no longer holds.
	#[error("change response for {site} ({user}) does not match the cached session")]
	ContextMismatch { site: String, user: String },

	/// The UI asked for something outside login/create/change/list/commit.
	#[error("unsupported action `{0}`")]
	UnsupportedAction(String),

	/// The host answered with something the router cannot act on.
	#[error("unrecognized native host response: {0}")]
	UnrecognizedResponse(String),

	/// Character classes for `create` outside `u`, `l`, `s`, `d`.
	#[error("rules may only contain the classes u, l, s, d (got `{0}`)")]
	InvalidRules(String),

	/// Requested password length does not fit the host's rule encoding.
	#[error("size {0} exceeds the maximum of {max}", max = MAX_SIZE)]
	InvalidSize(u32),

	/// Message did not have the expected shape.
	#[error("malformed message: {0}")]
	Malformed(#[from] serde_json::Error),

	#[error(transparent)]
	Channel(#[from] ChannelError),
}

impl From<UnknownAction> for Error {
	fn from(err: UnknownAction) -> Self {
		Error::UnsupportedAction(err.0)
	}
}

impl Error {
	/// Whether this error is reported to the popup as `{status: "ERROR"}`.
	///
	/// Transport errors always are. Host failures and aborted rotations only
	/// when [`RouterConfig::notify_ui_on_failure`] is set.
	pub fn surfaces_to_ui(&self, config: &RouterConfig) -> bool {
		match self {
			Error::Transport(_) => true,
			Error::BackendFailure | Error::ContextMismatch { .. } => config.notify_ui_on_failure,
			_ => false,
		}
	}

	/// Text placed in the `error` field of a UI status reply.
	pub fn ui_message(&self) -> String {
		match self {
			Error::Transport(message) => message.clone(),
			other => other.to_string(),
		}
	}
}

/// Failure to hand a message to one of the outbound channels.
#[derive(Debug, Error)]
pub enum ChannelError {
	/// No port is connected for this channel.
	#[error("{0} channel is not connected")]
	Disconnected(&'static str),

	#[error("failed to encode message: {0}")]
	Encode(#[from] serde_json::Error),

	/// The environment refused the message.
	#[error("{channel} rejected message: {message}")]
	Rejected {
		channel: &'static str,
		message: String,
	},
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn transport_errors_always_reach_the_ui() {
		let config = RouterConfig::default();
		let err = Error::Transport("Native host has exited.".into());
		assert!(err.surfaces_to_ui(&config));
		assert_eq!(err.ui_message(), "Native host has exited.");
	}

	#[test]
	fn protocol_failures_follow_config() {
		let quiet = RouterConfig::default();
		let loud = RouterConfig {
			notify_ui_on_failure: true,
			..RouterConfig::default()
		};
		let mismatch = Error::ContextMismatch {
			site: "example.com".into(),
			user: "alice".into(),
		};
		assert!(!Error::BackendFailure.surfaces_to_ui(&quiet));
		assert!(!mismatch.surfaces_to_ui(&quiet));
		assert!(Error::BackendFailure.surfaces_to_ui(&loud));
		assert!(mismatch.surfaces_to_ui(&loud));
	}

	#[test]
	fn dropped_messages_never_reach_the_ui() {
		let loud = RouterConfig {
			notify_ui_on_failure: true,
			..RouterConfig::default()
		};
		assert!(!Error::UnsupportedAction("undo".into()).surfaces_to_ui(&loud));
		assert!(!Error::InvalidSize(300).surfaces_to_ui(&loud));
	}

	#[test]
	fn unknown_action_converts_to_unsupported() {
		let err: Error = UnknownAction("delete".into()).into();
		assert_eq!(err.to_string(), "unsupported action `delete`");
	}
}
