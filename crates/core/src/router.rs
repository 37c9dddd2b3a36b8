//! The session state machine.
//!
//! [`SessionRouter`] consumes one event at a time from either side and
//! answers with at most one [`Outbound`] message:
//!
//! | Event | Outbound |
//! |---|---|
//! | UI request, manual, credential cached | [`Injection::Inject`] with the cached value |
//! | UI request otherwise | [`BackendRequest`] |
//! | host `login` answering a rotation's phase 1 | phase-2 [`BackendRequest`] (`change`) |
//! | host `login` / `create` / `change` | [`Injection`] |
//! | host `list` / `commit` | [`UiReply::Forward`] with the raw message |
//! | transport error | [`UiReply::Status`] |
//!
//! Everything else is logged and dropped.

use serde_json::Value;
use tracing::{debug, error, info, warn};
use websphinx_protocol::{
	Action, BackendRequest, BackendResponse, Injection, ResultRecord, Results, UiReply, UiRequest,
};

use crate::channel::{BackendChannel, Channels, InjectionSink, UiChannel};
use crate::config::RouterConfig;
use crate::error::{Error, Result};
use crate::exchange::{ExchangeTable, Flow, RotationPhase};
use crate::session::{CredentialKind, SessionState};
use crate::translate::{self, UiAction};

/// Event delivered by the native messaging port.
#[derive(Debug, Clone)]
pub enum BackendEvent {
	/// A message from the host.
	Message(Value),
	/// The port reported an error while delivering a message.
	Error(String),
	/// The port closed; no outstanding request will be answered.
	Disconnected(String),
}

/// Message the router wants delivered.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
	Backend(BackendRequest),
	Ui(UiReply),
	Inject(Injection),
}

/// Routes UI intents to the native host and host answers back to the page.
#[derive(Debug)]
pub struct SessionRouter {
	config: RouterConfig,
	session: SessionState,
	exchanges: ExchangeTable,
}

impl SessionRouter {
	pub fn new(config: RouterConfig) -> Self {
		let exchanges = ExchangeTable::new(config.max_pending_exchanges);
		Self {
			config,
			session: SessionState::new(),
			exchanges,
		}
	}

	pub fn config(&self) -> &RouterConfig {
		&self.config
	}

	pub fn session(&self) -> &SessionState {
		&self.session
	}

	pub fn exchanges(&self) -> &ExchangeTable {
		&self.exchanges
	}

	/// Handles a raw message from the popup or content script.
	pub fn handle_ui_message(&mut self, message: Value) -> Option<Outbound> {
		match serde_json::from_value::<UiRequest>(message) {
			Ok(request) => self.handle_ui_request(request),
			Err(err) => self.settle(Err(Error::Malformed(err))),
		}
	}

	/// Delivers `outbound` through `channels`.
	///
	/// A host request that could not be posted is withdrawn from the exchange
	/// table so a later answer of the same shape cannot resolve to it.
	pub fn dispatch<B, U, S>(
		&mut self,
		outbound: Outbound,
		channels: &mut Channels<B, U, S>,
	) -> Result<()>
	where
		B: BackendChannel,
		U: UiChannel,
		S: InjectionSink,
	{
		let delivered = channels.deliver(&outbound);
		if let (Err(err), Outbound::Backend(request)) = (&delivered, &outbound) {
			if let Some(exchange) = self.exchanges.withdraw(request) {
				warn!(
					target = "websphinx",
					id = exchange.id,
					cmd = %exchange.cmd,
					error = %err,
					"request not delivered to native host"
				);
			}
		}
		delivered
	}

	pub fn handle_ui_request(&mut self, request: UiRequest) -> Option<Outbound> {
		let outcome = self.route_ui_request(request);
		self.settle(outcome)
	}

	pub fn handle_backend_event(&mut self, event: BackendEvent) -> Option<Outbound> {
		let outcome = match event {
			BackendEvent::Message(message) => self.route_backend_message(message),
			BackendEvent::Error(reason) => Err(Error::Transport(reason)),
			BackendEvent::Disconnected(reason) => {
				if !self.exchanges.is_empty() {
					warn!(
						target = "websphinx",
						pending = self.exchanges.len(),
						"native host disconnected with requests outstanding"
					);
				}
				self.exchanges.clear();
				Err(Error::Transport(reason))
			}
		};
		self.settle(outcome)
	}

	fn route_ui_request(&mut self, request: UiRequest) -> Result<Option<Outbound>> {
		if request.site != self.session.site() {
			self.reset_context();
		} else if let Some(cached) = self.manual_replay(&request) {
			debug!(
				target = "websphinx",
				site = %request.site,
				action = %request.action,
				"replaying cached credential"
			);
			return Ok(Some(Outbound::Inject(Injection::Inject(cached))));
		}

		let msg = translate::to_backend_request(&request)?;
		let flow = if translate::starts_rotation(&request) {
			Flow::Rotation(RotationPhase::AwaitingCurrent)
		} else {
			Flow::Plain
		};
		if flow == Flow::Plain && msg.cmd == Action::Login {
			self.abandon_rotations("login requested");
		}
		Ok(Some(self.send(msg, flow)))
	}

	/// Clears the cached context along with every rotation still in flight.
	fn reset_context(&mut self) {
		self.abandon_rotations("context changed");
		self.session.reset();
	}

	fn abandon_rotations(&mut self, reason: &'static str) {
		let abandoned = self.exchanges.abandon_all_rotations();
		if abandoned > 0 {
			debug!(target = "websphinx", abandoned, reason, "abandoning password rotation");
		}
	}

	/// Returns the cached credential a manual request can be served from.
	///
	/// A cached value for another account resets the session instead.
	fn manual_replay(&mut self, request: &UiRequest) -> Option<String> {
		if !request.mode.is_manual() {
			return None;
		}
		let kind = request
			.action
			.parse::<Action>()
			.ok()
			.and_then(CredentialKind::from_action)?;
		let cached = self.session.cached(kind)?.to_string();
		if request.user() != self.session.user() {
			self.reset_context();
			return None;
		}
		Some(cached)
	}

	fn send(&mut self, mut msg: BackendRequest, flow: Flow) -> Outbound {
		let id = self.exchanges.open(&msg, flow);
		if self.config.send_request_ids {
			msg.id = Some(id);
		}
		debug!(
			target = "websphinx",
			id,
			cmd = %msg.cmd,
			site = %msg.site,
			?flow,
			"sending request to native host"
		);
		Outbound::Backend(msg)
	}

	fn route_backend_message(&mut self, message: Value) -> Result<Option<Outbound>> {
		let response: BackendResponse = serde_json::from_value(message.clone())?;
		let record = match &response.results {
			Results::Record(record) => record,
			Results::Status(_) if response.is_failure() => return Err(Error::BackendFailure),
			Results::Status(status) => {
				return Err(Error::UnrecognizedResponse(format!("status `{status}`")));
			}
		};

		let flow = self
			.exchanges
			.resolve(record)
			.map_or(Flow::Plain, |exchange| exchange.flow);
		let action = record.action();
		let held_context = self.session.matches(&record.site, record.user());
		let previous = (
			self.session.site().to_string(),
			self.session.user().to_string(),
		);

		if let (Some(kind), Some(password)) = (
			action.and_then(CredentialKind::from_action),
			record.password.as_deref(),
		) {
			self.session
				.update(&record.site, record.user(), kind, password);
		}

		if !record.mode.is_manual() {
			match (action, flow) {
				(Some(Action::Login), Flow::Rotation(RotationPhase::AwaitingCurrent))
					if record.password.is_some() =>
				{
					return Ok(Some(self.continue_rotation(record)));
				}
				(Some(Action::Change), _) if !held_context => {
					let abandoned = self.exchanges.abandon_rotations(&previous.0, &previous.1);
					debug!(target = "websphinx", abandoned, "dropping rotation state");
					self.session.reset();
					return Err(Error::ContextMismatch {
						site: record.site.clone(),
						user: record.user().to_string(),
					});
				}
				_ => {}
			}
		}

		let outbound = match translate::to_ui_action(record, &self.session) {
			UiAction::Inject(password) => Outbound::Inject(Injection::Inject(password)),
			UiAction::PerformLogin(credentials) => Outbound::Inject(Injection::Login(credentials)),
			UiAction::PerformCreate(credentials) => Outbound::Inject(Injection::Create(credentials)),
			UiAction::PerformChange(change) => {
				info!(
					target = "websphinx",
					site = %record.site,
					"password rotation ready to fill"
				);
				Outbound::Inject(Injection::Change(change))
			}
			UiAction::Forward => Outbound::Ui(UiReply::Forward(message)),
			UiAction::Discard(reason) => return Err(Error::UnrecognizedResponse(reason)),
		};
		Ok(Some(outbound))
	}

	/// Phase 1 answered: the current password is cached, ask for the new one.
	fn continue_rotation(&mut self, record: &ResultRecord) -> Outbound {
		info!(
			target = "websphinx",
			site = %record.site,
			"current password fetched, requesting rotation"
		);
		self.send(
			translate::rotation_commit(record),
			Flow::Rotation(RotationPhase::AwaitingNew),
		)
	}

	fn settle(&self, outcome: Result<Option<Outbound>>) -> Option<Outbound> {
		let err = match outcome {
			Ok(outbound) => return outbound,
			Err(err) => err,
		};

		match &err {
			Error::Transport(_) | Error::Channel(_) => {
				error!(target = "websphinx", error = %err, "native host channel failed")
			}
			Error::BackendFailure => warn!(target = "websphinx", "native host reported failure"),
			Error::ContextMismatch { site, .. } => warn!(
				target = "websphinx",
				site = %site,
				"rotation aborted, session no longer holds this account"
			),
			Error::UnsupportedAction(_)
			| Error::InvalidRules(_)
			| Error::InvalidSize(_) => warn!(target = "websphinx", error = %err, "dropping UI request"),
			Error::UnrecognizedResponse(_) | Error::Malformed(_) => {
				warn!(target = "websphinx", error = %err, "dropping unhandled message")
			}
		}

		err.surfaces_to_ui(&self.config)
			.then(|| Outbound::Ui(UiReply::error(err.ui_message())))
	}
}

impl Default for SessionRouter {
	fn default() -> Self {
		Self::new(RouterConfig::default())
	}
}
