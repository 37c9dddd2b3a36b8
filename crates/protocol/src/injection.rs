//! Instructions executed by the content script in the page.
//!
//! The content script exposes `document.websphinx` with one function per
//! [`Injection`] variant. The worker renders an injection into a one-line
//! script via [`Injection::to_script`].

use std::fmt;

use serde::Serialize;

/// Object exposed by the content script.
pub const INJECTION_NAMESPACE: &str = "document.websphinx";

/// Username and password handed to the page's login or signup form.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
	pub username: String,
	pub password: String,
}

impl fmt::Debug for Credentials {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Credentials")
			.field("username", &self.username)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// Current and replacement password for a change-password form.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct PasswordChange {
	pub old: String,
	pub new: String,
}

impl fmt::Debug for PasswordChange {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("PasswordChange { old: <redacted>, new: <redacted> }")
	}
}

/// Instruction for the content script.
#[derive(Clone, PartialEq, Eq)]
pub enum Injection {
	/// Type a raw password into the focused field.
	Inject(String),
	Login(Credentials),
	Create(Credentials),
	Change(PasswordChange),
}

impl Injection {
	/// Name of the `document.websphinx` function that handles this injection.
	pub fn function(&self) -> &'static str {
		match self {
			Injection::Inject(_) => "inject",
			Injection::Login(_) => "login",
			Injection::Create(_) => "create",
			Injection::Change(_) => "change",
		}
	}

	/// Renders `document.websphinx.<fn>(<json>);`.
	///
	/// The argument is JSON-encoded so credential text cannot break out of
	/// the call expression.
	pub fn to_script(&self) -> serde_json::Result<String> {
		let argument = match self {
			Injection::Inject(password) => serde_json::to_string(password)?,
			Injection::Login(credentials) | Injection::Create(credentials) => {
				serde_json::to_string(credentials)?
			}
			Injection::Change(change) => serde_json::to_string(change)?,
		};
		Ok(format!(
			"{INJECTION_NAMESPACE}.{}({argument});",
			self.function()
		))
	}
}

impl fmt::Debug for Injection {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Injection::Inject(_) => f.write_str("Inject(<redacted>)"),
			Injection::Login(credentials) => f.debug_tuple("Login").field(credentials).finish(),
			Injection::Create(credentials) => f.debug_tuple("Create").field(credentials).finish(),
			Injection::Change(change) => f.debug_tuple("Change").field(change).finish(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn inject_script_quotes_password() {
		let script = Injection::Inject("p\"w');alert(1)//".into())
			.to_script()
			.unwrap();
		assert_eq!(
			script,
			r#"document.websphinx.inject("p\"w');alert(1)//");"#
		);
	}

	#[test]
	fn login_script_passes_credentials_object() {
		let script = Injection::Login(Credentials {
			username: "alice".into(),
			password: "hunter2".into(),
		})
		.to_script()
		.unwrap();
		assert_eq!(
			script,
			r#"document.websphinx.login({"username":"alice","password":"hunter2"});"#
		);
	}

	#[test]
	fn change_script_passes_old_and_new() {
		let script = Injection::Change(PasswordChange {
			old: "one".into(),
			new: "two".into(),
		})
		.to_script()
		.unwrap();
		assert_eq!(
			script,
			r#"document.websphinx.change({"old":"one","new":"two"});"#
		);
	}

	#[test]
	fn debug_output_never_contains_passwords() {
		let injections = [
			Injection::Inject("secret1".into()),
			Injection::Create(Credentials {
				username: "bob".into(),
				password: "secret2".into(),
			}),
			Injection::Change(PasswordChange {
				old: "secret3".into(),
				new: "secret4".into(),
			}),
		];
		for injection in injections {
			let debug = format!("{injection:?}");
			assert!(!debug.contains("secret"), "{debug}");
		}
	}
}
