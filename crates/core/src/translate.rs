//! Pure mapping between UI intents, host requests and UI actions.

use websphinx_protocol::{
	Action, BackendRequest, Credentials, PasswordChange, ResultRecord, UiRequest,
};

use crate::error::{Error, Result};
use crate::session::{CredentialKind, SessionState};

/// Largest password length the host's 7-bit rule field can carry.
pub const MAX_SIZE: u32 = 0x7f;

/// Character classes accepted in `create` rules: upper, lower, symbols, digits.
pub const RULE_CLASSES: [char; 4] = ['u', 'l', 's', 'd'];

/// What a host response asks the worker to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
	/// Type the password into the focused field.
	Inject(String),
	PerformLogin(Credentials),
	PerformCreate(Credentials),
	PerformChange(PasswordChange),
	/// Hand the raw response to the popup.
	Forward,
	/// Nothing can be done with the response.
	Discard(String),
}

/// Builds the host request for a UI intent.
///
/// An automatic `change` is sent as `login`: the current password has to be
/// fetched before a replacement can be requested.
pub fn to_backend_request(request: &UiRequest) -> Result<BackendRequest> {
	let action: Action = request.action.parse()?;
	let mut msg = BackendRequest::new(action, request.mode, request.site.clone());

	if action != Action::List {
		msg.name = request.name.clone();
	}

	match action {
		Action::Create => {
			if let Some(rules) = &request.rules {
				validate_rules(rules)?;
			}
			if let Some(size) = request.size {
				validate_size(size)?;
			}
			msg.rules = request.rules.clone();
			msg.size = request.size;
		}
		Action::Change if !request.mode.is_manual() => msg.cmd = Action::Login,
		_ => {}
	}

	Ok(msg)
}

/// Returns `true` if `request` begins an automatic password rotation.
pub fn starts_rotation(request: &UiRequest) -> bool {
	request.action == Action::Change.as_str() && !request.mode.is_manual()
}

/// Builds the phase-2 request from the host's answer to phase 1.
///
/// Every echoed field is carried over except the password.
pub fn rotation_commit(record: &ResultRecord) -> BackendRequest {
	let mut msg = BackendRequest::new(Action::Change, record.mode, record.site.clone());
	msg.name = record.name.clone();
	msg.extra = record.extra.clone();
	msg
}

/// Classifies a host response.
///
/// `session` supplies the current password for a completed rotation.
pub fn to_ui_action(record: &ResultRecord, session: &SessionState) -> UiAction {
	let Some(action) = record.action() else {
		return UiAction::Discard(format!("unknown command `{}`", record.cmd));
	};

	if !action.yields_credential() {
		return UiAction::Forward;
	}

	let Some(password) = record.password.clone() else {
		return UiAction::Discard(format!("`{action}` response carries no password"));
	};

	if record.mode.is_manual() {
		return UiAction::Inject(password);
	}

	let credentials = || Credentials {
		username: record.user().to_string(),
		password: password.clone(),
	};
	match action {
		Action::Login => UiAction::PerformLogin(credentials()),
		Action::Create => UiAction::PerformCreate(credentials()),
		Action::Change => UiAction::PerformChange(PasswordChange {
			old: session
				.cached(CredentialKind::Login)
				.unwrap_or_default()
				.to_string(),
			new: password.clone(),
		}),
		Action::List | Action::Commit => UiAction::Forward,
	}
}

fn validate_rules(rules: &str) -> Result<()> {
	if rules.chars().all(|c| RULE_CLASSES.contains(&c)) {
		Ok(())
	} else {
		Err(Error::InvalidRules(rules.to_string()))
	}
}

fn validate_size(size: u32) -> Result<()> {
	if size <= MAX_SIZE {
		Ok(())
	} else {
		Err(Error::InvalidSize(size))
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;
	use websphinx_protocol::Mode;

	use super::*;

	fn record(value: serde_json::Value) -> ResultRecord {
		serde_json::from_value(value).unwrap()
	}

	#[test]
	fn automatic_change_is_sent_as_login() {
		let request = UiRequest::new(Action::Change, Mode::Auto, "example.com").with_name("alice");
		let msg = to_backend_request(&request).unwrap();
		assert_eq!(msg.cmd, Action::Login);
		assert_eq!(msg.name.as_deref(), Some("alice"));
		assert!(starts_rotation(&request));
	}

	#[test]
	fn manual_change_is_sent_as_change() {
		let request =
			UiRequest::new(Action::Change, Mode::Manual, "example.com").with_name("alice");
		let msg = to_backend_request(&request).unwrap();
		assert_eq!(msg.cmd, Action::Change);
		assert!(!starts_rotation(&request));
	}

	#[test]
	fn list_omits_account() {
		let request = UiRequest::new(Action::List, Mode::Auto, "example.com").with_name("alice");
		let json = serde_json::to_value(to_backend_request(&request).unwrap()).unwrap();
		assert_eq!(
			json,
			json!({"cmd": "list", "mode": "auto", "site": "example.com"})
		);
	}

	#[test]
	fn create_forwards_generation_parameters() {
		let request = UiRequest::new(Action::Create, Mode::Auto, "example.com")
			.with_name("alice")
			.with_rules("ulsd", 20);
		let json = serde_json::to_value(to_backend_request(&request).unwrap()).unwrap();
		assert_eq!(
			json,
			json!({
				"cmd": "create",
				"mode": "auto",
				"site": "example.com",
				"name": "alice",
				"rules": "ulsd",
				"size": 20,
			})
		);
	}

	#[test]
	fn rules_are_only_forwarded_for_create() {
		let request = UiRequest::new(Action::Login, Mode::Auto, "example.com")
			.with_name("alice")
			.with_rules("ulsd", 20);
		let msg = to_backend_request(&request).unwrap();
		assert_eq!(msg.rules, None);
		assert_eq!(msg.size, None);
	}

	#[test]
	fn create_rejects_unknown_classes() {
		let request = UiRequest::new(Action::Create, Mode::Auto, "example.com").with_rules("ulx", 10);
		assert!(matches!(
			to_backend_request(&request),
			Err(Error::InvalidRules(rules)) if rules == "ulx"
		));
	}

	#[test]
	fn create_rejects_oversized_passwords() {
		let request = UiRequest::new(Action::Create, Mode::Auto, "example.com").with_rules("u", 128);
		assert!(matches!(
			to_backend_request(&request),
			Err(Error::InvalidSize(128))
		));
	}

	#[test]
	fn unknown_actions_are_rejected() {
		let mut request = UiRequest::new(Action::Login, Mode::Auto, "example.com");
		request.action = "undo".into();
		assert!(matches!(
			to_backend_request(&request),
			Err(Error::UnsupportedAction(action)) if action == "undo"
		));
	}

	#[test]
	fn rotation_commit_strips_password_and_keeps_echoed_fields() {
		let phase_one = record(json!({
			"cmd": "login",
			"mode": "auto",
			"site": "example.com",
			"name": "alice",
			"password": "old",
			"rules": "ulsd",
		}));
		let json = serde_json::to_value(rotation_commit(&phase_one)).unwrap();
		assert_eq!(
			json,
			json!({
				"cmd": "change",
				"mode": "auto",
				"site": "example.com",
				"name": "alice",
				"rules": "ulsd",
			})
		);
	}

	#[test]
	fn classifies_credential_responses() {
		let session = SessionState::new();
		let login = record(json!({
			"cmd": "login", "mode": "auto", "site": "example.com", "name": "alice", "password": "pw"
		}));
		assert_eq!(
			to_ui_action(&login, &session),
			UiAction::PerformLogin(Credentials {
				username: "alice".into(),
				password: "pw".into(),
			})
		);

		let create = record(json!({
			"cmd": "create", "mode": "auto", "site": "example.com", "name": "alice", "password": "gen"
		}));
		assert!(matches!(
			to_ui_action(&create, &session),
			UiAction::PerformCreate(c) if c.password == "gen"
		));
	}

	#[test]
	fn manual_responses_are_injected() {
		let session = SessionState::new();
		let change = record(json!({
			"cmd": "change", "mode": "manual", "site": "example.com", "name": "alice", "password": "new"
		}));
		assert_eq!(
			to_ui_action(&change, &session),
			UiAction::Inject("new".into())
		);
	}

	#[test]
	fn change_pairs_cached_login_with_new_password() {
		let mut session = SessionState::new();
		session.update("example.com", "alice", CredentialKind::Login, "old");
		let change = record(json!({
			"cmd": "change", "mode": "auto", "site": "example.com", "name": "alice", "password": "new"
		}));
		assert_eq!(
			to_ui_action(&change, &session),
			UiAction::PerformChange(PasswordChange {
				old: "old".into(),
				new: "new".into(),
			})
		);
	}

	#[test]
	fn list_and_commit_are_forwarded() {
		let session = SessionState::new();
		for cmd in ["list", "commit"] {
			let response = record(json!({"cmd": cmd, "mode": "auto", "site": "example.com"}));
			assert_eq!(to_ui_action(&response, &session), UiAction::Forward);
		}
	}

	#[test]
	fn unusable_responses_are_discarded() {
		let session = SessionState::new();
		let unknown = record(json!({"cmd": "undo", "site": "example.com"}));
		assert!(matches!(to_ui_action(&unknown, &session), UiAction::Discard(_)));

		let no_password = record(json!({"cmd": "login", "site": "example.com", "name": "alice"}));
		assert!(matches!(to_ui_action(&no_password, &session), UiAction::Discard(_)));
	}
}
