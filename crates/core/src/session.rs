//! Credential cache for the site and account currently in use.

use std::fmt;

use websphinx_protocol::Action;

/// Which cached credential a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKind {
	/// Current password, as returned by `login`.
	Login,
	/// Replacement password staged by `change`.
	Change,
	/// Password generated by `create`.
	Create,
}

impl CredentialKind {
	pub fn from_action(action: Action) -> Option<Self> {
		match action {
			Action::Login => Some(CredentialKind::Login),
			Action::Change => Some(CredentialKind::Change),
			Action::Create => Some(CredentialKind::Create),
			Action::List | Action::Commit => None,
		}
	}
}

/// Credentials the host returned for one (site, account) pair.
///
/// The credential fields are only meaningful while `site` and `user` match the
/// message being processed; a different pair wipes the whole record.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionState {
	site: String,
	user: String,
	login: String,
	change: String,
	create: String,
}

impl SessionState {
	pub fn new() -> Self {
		Self::default()
	}

	/// Forgets the cached context and every credential.
	pub fn reset(&mut self) {
		*self = Self::default();
	}

	/// Caches `value` as the `kind` credential for `(site, user)`, dropping
	/// everything cached for a different pair first.
	pub fn update(&mut self, site: &str, user: &str, kind: CredentialKind, value: &str) {
		if !self.matches(site, user) {
			self.reset();
			self.site = site.to_string();
			self.user = user.to_string();
		}
		let slot = match kind {
			CredentialKind::Login => &mut self.login,
			CredentialKind::Change => &mut self.change,
			CredentialKind::Create => &mut self.create,
		};
		*slot = value.to_string();
	}

	pub fn matches(&self, site: &str, user: &str) -> bool {
		self.site == site && self.user == user
	}

	/// The cached credential of `kind`, or `None` if nothing is cached.
	pub fn cached(&self, kind: CredentialKind) -> Option<&str> {
		let value = match kind {
			CredentialKind::Login => &self.login,
			CredentialKind::Change => &self.change,
			CredentialKind::Create => &self.create,
		};
		(!value.is_empty()).then_some(value.as_str())
	}

	pub fn site(&self) -> &str {
		&self.site
	}

	pub fn user(&self) -> &str {
		&self.user
	}

	pub fn is_empty(&self) -> bool {
		*self == Self::default()
	}
}

impl fmt::Debug for SessionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mark = |value: &String| if value.is_empty() { "<empty>" } else { "<cached>" };
		f.debug_struct("SessionState")
			.field("site", &self.site)
			.field("user", &self.user)
			.field("login", &mark(&self.login))
			.field("change", &mark(&self.change))
			.field("create", &mark(&self.create))
			.finish()
	}
}
