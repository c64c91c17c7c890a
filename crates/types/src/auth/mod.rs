//! Caller identity passed into the control plane
//!
//! Authentication itself lives in the HTTP adapter; the core only receives
//! the resolved identity and enforces ownership and admin checks.

/// Resolved caller identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
	/// Producer identity; `None` for anonymous callers.
	pub owner: Option<String>,
	pub is_admin: bool,
}

impl AuthContext {
	pub fn owner(owner: impl Into<String>) -> Self {
		Self {
			owner: Some(owner.into()),
			is_admin: false,
		}
	}

	pub fn admin() -> Self {
		Self {
			owner: None,
			is_admin: true,
		}
	}

	/// Internal identity used by the scheduler when firing cron entries.
	pub fn system() -> Self {
		Self {
			owner: Some("system".to_string()),
			is_admin: true,
		}
	}

	/// Whether this caller may act on a job owned by `job_owner`.
	pub fn may_access(&self, job_owner: Option<&str>) -> bool {
		if self.is_admin {
			return true;
		}
		match (self.owner.as_deref(), job_owner) {
			(Some(caller), Some(owner)) => caller == owner,
			// Ownerless jobs are admin-only
			(Some(_), None) => false,
			(None, _) => false,
		}
	}
}
