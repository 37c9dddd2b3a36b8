//! Recording channel implementations for tests.
//!
//! Each fake keeps every message it was handed, so a test can drive a
//! [`SessionRouter`](crate::SessionRouter) through [`Channels::deliver`] and
//! then assert on what reached the host, the popup, and the page.
//!
//! # Example
//!
//! ```ignore
//! use websphinx::testing::recording_channels;
//!
//! let mut channels = recording_channels();
//! router.dispatch(outbound, &mut channels)?;
//! assert_eq!(channels.backend.sent.len(), 1);
//! ```

use websphinx_protocol::{BackendRequest, Injection, UiReply};

use crate::channel::{BackendChannel, Channels, InjectionSink, UiChannel};
use crate::error::ChannelError;

/// Records host requests; can be switched to refuse them.
#[derive(Debug, Default)]
pub struct RecordingBackend {
	pub sent: Vec<BackendRequest>,
	pub disconnected: bool,
}

impl BackendChannel for RecordingBackend {
	fn post(&mut self, request: &BackendRequest) -> Result<(), ChannelError> {
		if self.disconnected {
			return Err(ChannelError::Disconnected("native host"));
		}
		self.sent.push(request.clone());
		Ok(())
	}
}

/// Records popup replies.
#[derive(Debug, Default)]
pub struct RecordingUi {
	pub replies: Vec<UiReply>,
}

impl UiChannel for RecordingUi {
	fn reply(&mut self, reply: &UiReply) -> Result<(), ChannelError> {
		self.replies.push(reply.clone());
		Ok(())
	}
}

/// Records page injections.
#[derive(Debug, Default)]
pub struct RecordingSink {
	pub executed: Vec<Injection>,
}

impl InjectionSink for RecordingSink {
	fn execute(&mut self, injection: &Injection) -> Result<(), ChannelError> {
		self.executed.push(injection.clone());
		Ok(())
	}
}

pub type RecordingChannels = Channels<RecordingBackend, RecordingUi, RecordingSink>;

pub fn recording_channels() -> RecordingChannels {
	Channels::default()
}

impl RecordingChannels {
	/// Total number of messages delivered to any endpoint.
	pub fn delivered(&self) -> usize {
		self.backend.sent.len() + self.ui.replies.len() + self.sink.executed.len()
	}
}

#[cfg(test)]
mod tests {
	use websphinx_protocol::{Action, Mode};

	use super::*;
	use crate::error::Error;
	use crate::router::Outbound;

	#[test]
	fn deliver_routes_by_destination() {
		let mut channels = recording_channels();
		channels
			.deliver(&Outbound::Backend(BackendRequest::new(
				Action::List,
				Mode::Auto,
				"example.com",
			)))
			.unwrap();
		channels.deliver(&Outbound::Ui(UiReply::error("x"))).unwrap();
		channels
			.deliver(&Outbound::Inject(Injection::Inject("pw".into())))
			.unwrap();

		assert_eq!(channels.backend.sent.len(), 1);
		assert_eq!(channels.ui.replies.len(), 1);
		assert_eq!(channels.sink.executed.len(), 1);
		assert_eq!(channels.delivered(), 3);
	}

	#[test]
	fn disconnected_backend_refuses_requests() {
		let mut channels = recording_channels();
		channels.backend.disconnected = true;
		let result = channels.deliver(&Outbound::Backend(BackendRequest::new(
			Action::List,
			Mode::Auto,
			"example.com",
		)));
		assert!(matches!(
			result,
			Err(Error::Channel(ChannelError::Disconnected(_)))
		));
		assert_eq!(channels.delivered(), 0);
	}
}
