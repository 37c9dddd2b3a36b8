//! Correlation of native host responses with outstanding requests.
//!
//! Each request sent to the host opens an [`Exchange`]. A response closes the
//! exchange named by its echoed `id`, or, for hosts that do not echo ids, the
//! oldest exchange with the same command, mode, site and account. Rotation
//! progress is recorded on the exchange itself, so a plain login for one
//! account is never mistaken for the first phase of another's rotation.

use indexmap::IndexMap;
use tracing::warn;
use websphinx_protocol::{Action, BackendRequest, Mode, ResultRecord};

/// Identifier of an outstanding host request.
pub type ExchangeId = u64;

/// Progress of an automatic password rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationPhase {
	/// Phase 1: a `login` was sent to learn the current password.
	AwaitingCurrent,
	/// Phase 2: a `change` was sent to obtain the replacement password.
	AwaitingNew,
}

/// What the router does with the response to an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
	/// Single round trip.
	Plain,
	Rotation(RotationPhase),
}

/// An unanswered host request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
	pub id: ExchangeId,
	pub cmd: Action,
	pub mode: Mode,
	pub site: String,
	pub user: String,
	pub flow: Flow,
}

impl Exchange {
	/// Returns `true` if `record` has the shape of this exchange's answer.
	///
	/// `list` requests carry no account, so only the site is compared.
	pub fn answers(&self, record: &ResultRecord) -> bool {
		record.action() == Some(self.cmd)
			&& record.mode == self.mode
			&& record.site == self.site
			&& (self.cmd == Action::List || record.user() == self.user)
	}

	fn sent_as(&self, request: &BackendRequest) -> bool {
		request.cmd == self.cmd
			&& request.mode == self.mode
			&& request.site == self.site
			&& request.user() == self.user
	}
}

/// Outstanding exchanges in the order they were opened.
#[derive(Debug)]
pub struct ExchangeTable {
	next_id: ExchangeId,
	capacity: usize,
	pending: IndexMap<ExchangeId, Exchange>,
}

impl ExchangeTable {
	pub fn new(capacity: usize) -> Self {
		Self {
			next_id: 1,
			capacity: capacity.max(1),
			pending: IndexMap::new(),
		}
	}

	/// Records `request` as outstanding and returns its id.
	///
	/// Evicts the oldest exchange when the table is full.
	pub fn open(&mut self, request: &BackendRequest, flow: Flow) -> ExchangeId {
		while self.pending.len() >= self.capacity {
			if let Some((id, stale)) = self.pending.shift_remove_index(0) {
				warn!(
					target = "websphinx",
					id,
					cmd = %stale.cmd,
					site = %stale.site,
					"evicting unanswered native host request"
				);
			}
		}

		let id = self.next_id;
		self.next_id += 1;
		self.pending.insert(
			id,
			Exchange {
				id,
				cmd: request.cmd,
				mode: request.mode,
				site: request.site.clone(),
				user: request.user().to_string(),
				flow,
			},
		);
		id
	}

	/// Closes and returns the exchange `record` answers, if any.
	///
	/// An echoed id is authoritative: an unknown id resolves to nothing.
	pub fn resolve(&mut self, record: &ResultRecord) -> Option<Exchange> {
		if let Some(id) = record.id {
			return self.pending.shift_remove(&id);
		}
		let index = self
			.pending
			.values()
			.position(|exchange| exchange.answers(record))?;
		self.pending
			.shift_remove_index(index)
			.map(|(_, exchange)| exchange)
	}

	pub fn get(&self, id: ExchangeId) -> Option<&Exchange> {
		self.pending.get(&id)
	}

	pub fn iter(&self) -> impl Iterator<Item = &Exchange> {
		self.pending.values()
	}

	pub fn len(&self) -> usize {
		self.pending.len()
	}

	pub fn is_empty(&self) -> bool {
		self.pending.is_empty()
	}

	/// Forgets the exchange opened for `request`, which never reached the host.
	///
	/// Matches by id when the request carries one, otherwise the newest
	/// exchange opened for the same command, mode, site and account.
	pub fn withdraw(&mut self, request: &BackendRequest) -> Option<Exchange> {
		if let Some(id) = request.id {
			return self.pending.shift_remove(&id);
		}
		let index = self
			.pending
			.values()
			.rposition(|exchange| exchange.sent_as(request))?;
		self.pending
			.shift_remove_index(index)
			.map(|(_, exchange)| exchange)
	}

	/// Drops rotations in progress for `(site, user)`; returns how many.
	pub fn abandon_rotations(&mut self, site: &str, user: &str) -> usize {
		self.abandon_rotations_where(|exchange| exchange.site == site && exchange.user == user)
	}

	/// Drops every rotation in progress; returns how many.
	pub fn abandon_all_rotations(&mut self) -> usize {
		self.abandon_rotations_where(|_| true)
	}

	fn abandon_rotations_where(&mut self, mut select: impl FnMut(&Exchange) -> bool) -> usize {
		let before = self.pending.len();
		self.pending.retain(|_, exchange| {
			!(matches!(exchange.flow, Flow::Rotation(_)) && select(exchange))
		});
		before - self.pending.len()
	}

	/// Abandons every outstanding exchange.
	pub fn clear(&mut self) {
		self.pending.clear();
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn request(cmd: Action, site: &str, user: &str) -> BackendRequest {
		let mut request = BackendRequest::new(cmd, Mode::Auto, site);
		request.name = Some(user.to_string());
		request
	}

	fn record(value: serde_json::Value) -> ResultRecord {
		serde_json::from_value(value).unwrap()
	}

	#[test]
	fn ids_are_monotonic() {
		let mut table = ExchangeTable::new(8);
		let first = table.open(&request(Action::Login, "a.com", "u"), Flow::Plain);
		let second = table.open(&request(Action::Login, "b.com", "u"), Flow::Plain);
		assert!(second > first);
		assert_eq!(table.len(), 2);
	}

	#[test]
	fn resolves_by_shape_oldest_first() {
		let mut table = ExchangeTable::new(8);
		let rotation = table.open(
			&request(Action::Login, "a.com", "alice"),
			Flow::Rotation(RotationPhase::AwaitingCurrent),
		);
		let plain = table.open(&request(Action::Login, "a.com", "alice"), Flow::Plain);

		let answer = record(json!({"cmd": "login", "mode": "auto", "site": "a.com", "name": "alice"}));
		assert_eq!(table.resolve(&answer).map(|e| e.id), Some(rotation));
		assert_eq!(table.resolve(&answer).map(|e| e.id), Some(plain));
		assert!(table.resolve(&answer).is_none());
	}

	#[test]
	fn other_account_does_not_resolve_rotation() {
		let mut table = ExchangeTable::new(8);
		table.open(
			&request(Action::Login, "a.com", "alice"),
			Flow::Rotation(RotationPhase::AwaitingCurrent),
		);
		let stray = record(json!({"cmd": "login", "mode": "auto", "site": "a.com", "name": "bob"}));
		assert!(table.resolve(&stray).is_none());
		assert_eq!(table.len(), 1);
	}

	#[test]
	fn echoed_id_is_authoritative() {
		let mut table = ExchangeTable::new(8);
		let first = table.open(&request(Action::Login, "a.com", "alice"), Flow::Plain);
		let second = table.open(&request(Action::Login, "a.com", "alice"), Flow::Plain);

		let answer = record(json!({
			"cmd": "login", "mode": "auto", "site": "a.com", "name": "alice", "id": second
		}));
		assert_eq!(table.resolve(&answer).map(|e| e.id), Some(second));
		assert!(table.get(first).is_some());

		let unknown = record(json!({
			"cmd": "login", "mode": "auto", "site": "a.com", "name": "alice", "id": 999
		}));
		assert!(table.resolve(&unknown).is_none());
		assert_eq!(table.len(), 1);
	}

	#[test]
	fn list_matches_without_account() {
		let mut table = ExchangeTable::new(8);
		table.open(
			&BackendRequest::new(Action::List, Mode::Auto, "a.com"),
			Flow::Plain,
		);
		let answer = record(json!({"cmd": "list", "mode": "auto", "site": "a.com", "name": "x\ny"}));
		assert!(table.resolve(&answer).is_some());
	}

	#[test]
	fn abandon_rotations_keeps_plain_and_other_accounts() {
		let mut table = ExchangeTable::new(8);
		table.open(
			&request(Action::Change, "a.com", "alice"),
			Flow::Rotation(RotationPhase::AwaitingNew),
		);
		let plain = table.open(&request(Action::Login, "a.com", "alice"), Flow::Plain);
		let other = table.open(
			&request(Action::Change, "a.com", "bob"),
			Flow::Rotation(RotationPhase::AwaitingNew),
		);

		assert_eq!(table.abandon_rotations("a.com", "alice"), 1);
		let left: Vec<_> = table.iter().map(|e| e.id).collect();
		assert_eq!(left, vec![plain, other]);
	}

	#[test]
	fn abandon_all_rotations_keeps_plain() {
		let mut table = ExchangeTable::new(8);
		table.open(
			&request(Action::Login, "a.com", "alice"),
			Flow::Rotation(RotationPhase::AwaitingCurrent),
		);
		let plain = table.open(
			&BackendRequest::new(Action::List, Mode::Auto, "b.com"),
			Flow::Plain,
		);
		table.open(
			&request(Action::Change, "c.com", "bob"),
			Flow::Rotation(RotationPhase::AwaitingNew),
		);

		assert_eq!(table.abandon_all_rotations(), 2);
		let left: Vec<_> = table.iter().map(|e| e.id).collect();
		assert_eq!(left, vec![plain]);
	}

	#[test]
	fn withdraw_removes_newest_matching_request() {
		let mut table = ExchangeTable::new(8);
		let login = request(Action::Login, "a.com", "alice");
		let older = table.open(&login, Flow::Plain);
		let newer = table.open(&login, Flow::Rotation(RotationPhase::AwaitingCurrent));

		assert_eq!(table.withdraw(&login).map(|e| e.id), Some(newer));
		assert!(table.get(older).is_some());
		assert!(table.withdraw(&request(Action::Login, "a.com", "bob")).is_none());
		assert_eq!(table.len(), 1);
	}

	#[test]
	fn withdraw_prefers_attached_id() {
		let mut table = ExchangeTable::new(8);
		let mut login = request(Action::Login, "a.com", "alice");
		let first = table.open(&login, Flow::Plain);
		let second = table.open(&login, Flow::Plain);

		login.id = Some(first);
		assert_eq!(table.withdraw(&login).map(|e| e.id), Some(first));
		assert!(table.get(second).is_some());
	}

	#[test]
	fn full_table_evicts_oldest() {
		let mut table = ExchangeTable::new(2);
		let first = table.open(&request(Action::Login, "a.com", "u"), Flow::Plain);
		let second = table.open(&request(Action::Login, "b.com", "u"), Flow::Plain);
		let third = table.open(&request(Action::Login, "c.com", "u"), Flow::Plain);
		assert!(table.get(first).is_none());
		assert!(table.get(second).is_some());
		assert!(table.get(third).is_some());
		assert_eq!(table.len(), 2);
	}
}
