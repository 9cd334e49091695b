//! Identity - resolving the acting party's role once per session.
//!
//! Accounts are mapped to roles in exactly one place, the [`RoleDirectory`],
//! when a session starts. Everything downstream reads the resolved [`Role`].

use crate::role::Role;
use serde::{Deserialize, Serialize};

/// The identity collaborator as seen by the workflow.
///
/// Always answers: an unauthenticated caller never reaches the workflow.
pub trait IdentityProvider: Send + Sync + 'static {
    fn current_role(&self) -> Role;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("account {0:?} is not a member of this board")]
    UnknownAccount(String),

    #[error("both roles are configured with the same account {0:?}")]
    DuplicateAccount(String),
}

/// Maps the two member accounts to their roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDirectory {
    admin_account: String,
    user_account: String,
}

impl RoleDirectory {
    pub fn new(
        admin_account: impl Into<String>,
        user_account: impl Into<String>,
    ) -> Result<Self, IdentityError> {
        let admin_account = normalize(&admin_account.into());
        let user_account = normalize(&user_account.into());
        if admin_account == user_account {
            return Err(IdentityError::DuplicateAccount(admin_account));
        }
        Ok(Self {
            admin_account,
            user_account,
        })
    }

    /// Case-insensitive lookup of an account identifier.
    pub fn resolve(&self, account: &str) -> Result<Role, IdentityError> {
        let account = normalize(account);
        if account == self.admin_account {
            Ok(Role::Admin)
        } else if account == self.user_account {
            Ok(Role::User)
        } else {
            Err(IdentityError::UnknownAccount(account))
        }
    }

    pub fn account_of(&self, role: Role) -> &str {
        match role {
            Role::Admin => &self.admin_account,
            Role::User => &self.user_account,
        }
    }
}

fn normalize(account: &str) -> String {
    account.trim().to_lowercase()
}

/// A signed-in party with its role resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    account: String,
    role: Role,
}

impl Session {
    pub fn start(directory: &RoleDirectory, account: &str) -> Result<Self, IdentityError> {
        let role = directory.resolve(account)?;
        tracing::info!(tandem.actor = %role, "Session started");
        Ok(Self {
            account: normalize(account),
            role,
        })
    }

    /// A session for `role` without a directory lookup.
    pub fn for_role(role: Role) -> Self {
        Self {
            account: role.as_str().to_string(),
            role,
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn role(&self) -> Role {
        self.role
    }
}

impl IdentityProvider for Session {
    fn current_role(&self) -> Role {
        self.role
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> RoleDirectory {
        RoleDirectory::new("Sam@Example.com", "alex@example.com").unwrap()
    }

    #[test]
    fn resolves_accounts_case_insensitively() {
        let dir = directory();
        assert_eq!(dir.resolve(" sam@example.COM "), Ok(Role::Admin));
        assert_eq!(dir.resolve("alex@example.com"), Ok(Role::User));
        assert_eq!(dir.account_of(Role::Admin), "sam@example.com");
    }

    #[test]
    fn strangers_are_rejected() {
        assert_eq!(
            directory().resolve("eve@example.com"),
            Err(IdentityError::UnknownAccount("eve@example.com".into()))
        );
    }

    #[test]
    fn one_account_cannot_hold_both_roles() {
        assert!(matches!(
            RoleDirectory::new("a@b.c", "A@B.C"),
            Err(IdentityError::DuplicateAccount(_))
        ));
    }

    #[test]
    fn session_reports_resolved_role() {
        let session = Session::start(&directory(), "alex@example.com").unwrap();
        assert_eq!(session.current_role(), Role::User);
        assert_eq!(session.account(), "alex@example.com");
    }
}
