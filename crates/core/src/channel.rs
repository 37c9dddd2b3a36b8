//! Outbound seams implemented by the environment.
//!
//! The router never talks to a port directly; it returns an [`Outbound`] and
//! the caller hands it to a [`Channels`] bundle, usually through
//! [`SessionRouter::dispatch`](crate::SessionRouter::dispatch).

use websphinx_protocol::{BackendRequest, Injection, UiReply};

use crate::error::{ChannelError, Result};
use crate::router::Outbound;

/// Port to the native messaging host.
pub trait BackendChannel {
	fn post(&mut self, request: &BackendRequest) -> std::result::Result<(), ChannelError>;
}

/// Port to the popup / content script that sent the last request.
pub trait UiChannel {
	fn reply(&mut self, reply: &UiReply) -> std::result::Result<(), ChannelError>;
}

/// Executes form-fill instructions in the active tab.
pub trait InjectionSink {
	fn execute(&mut self, injection: &Injection) -> std::result::Result<(), ChannelError>;
}

/// The three outbound endpoints of the worker.
#[derive(Debug, Default)]
pub struct Channels<B, U, S> {
	pub backend: B,
	pub ui: U,
	pub sink: S,
}

impl<B, U, S> Channels<B, U, S>
where
	B: BackendChannel,
	U: UiChannel,
	S: InjectionSink,
{
	pub fn new(backend: B, ui: U, sink: S) -> Self {
		Self { backend, ui, sink }
	}

	/// Sends `outbound` to the endpoint it is addressed to.
	pub fn deliver(&mut self, outbound: &Outbound) -> Result<()> {
		match outbound {
			Outbound::Backend(request) => self.backend.post(request)?,
			Outbound::Ui(reply) => self.ui.reply(reply)?,
			Outbound::Inject(injection) => self.sink.execute(injection)?,
		}
		Ok(())
	}
}
