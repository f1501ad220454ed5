use std::collections::HashSet;

use async_trait::async_trait;
use pgwire::api::auth::{AuthSource, LoginInfo, Password};
use pgwire::error::PgWireResult;

use crate::engine::EngineError;

// ── Connection login ────────────────────────────────────────────

/// Shared-password login for the wire protocol. Who the user *is* only
/// matters afterwards, when the [`AccessGate`] assigns a role.
#[derive(Debug)]
pub struct StaydeskAuthSource {
    password: String,
}

impl StaydeskAuthSource {
    pub fn new(password: String) -> Self {
        Self { password }
    }
}

#[async_trait]
impl AuthSource for StaydeskAuthSource {
    async fn get_password(&self, _login: &LoginInfo) -> PgWireResult<Password> {
        Ok(Password::new(None, self.password.as_bytes().to_vec()))
    }
}

// ── Capability gate ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Guest,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Guest => "guest",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
    pub id: String,
    pub role: Role,
}

/// Outcome of the capability check, passed into every engine operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    Permitted(Operator),
    /// `status` is 401 (no identity) or 403 (identity without the capability).
    Denied { reason: String, status: u16 },
}

impl Authorization {
    pub fn admin(id: impl Into<String>) -> Self {
        Authorization::Permitted(Operator {
            id: id.into(),
            role: Role::Admin,
        })
    }

    pub fn guest(id: impl Into<String>) -> Self {
        Authorization::Permitted(Operator {
            id: id.into(),
            role: Role::Guest,
        })
    }

    /// Any authenticated caller.
    pub fn operator(&self) -> Result<&Operator, EngineError> {
        match self {
            Authorization::Permitted(op) => Ok(op),
            Authorization::Denied { reason, status } => Err(EngineError::Denied {
                reason: reason.clone(),
                status: *status,
            }),
        }
    }

    pub fn require_admin(&self) -> Result<&Operator, EngineError> {
        let op = self.operator()?;
        if op.role != Role::Admin {
            return Err(EngineError::Denied {
                reason: format!("{} is not an administrator", op.id),
                status: 403,
            });
        }
        Ok(op)
    }
}

/// Decides what a logged-in user may do.
pub trait AccessGate: Send + Sync {
    fn authorize(&self, user: Option<&str>) -> Authorization;
}

/// Users named in the list are admins; everyone else who logged in is a guest.
#[derive(Debug, Default, Clone)]
pub struct AdminList {
    admins: HashSet<String>,
}

impl AdminList {
    pub fn new<I, S>(admins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            admins: admins.into_iter().map(Into::into).collect(),
        }
    }
}

impl AccessGate for AdminList {
    fn authorize(&self, user: Option<&str>) -> Authorization {
        match user.map(str::trim).filter(|u| !u.is_empty()) {
            None => Authorization::Denied {
                reason: "no user on connection".into(),
                status: 401,
            },
            Some(u) if self.admins.contains(u) => Authorization::admin(u),
            Some(u) => Authorization::guest(u),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_list_roles() {
        let gate = AdminList::new(["owner", "manager"]);
        assert_eq!(gate.authorize(Some("owner")), Authorization::admin("owner"));
        assert_eq!(gate.authorize(Some("walkin")), Authorization::guest("walkin"));
        assert!(matches!(
            gate.authorize(None),
            Authorization::Denied { status: 401, .. }
        ));
        assert!(matches!(
            gate.authorize(Some("  ")),
            Authorization::Denied { status: 401, .. }
        ));
    }

    #[test]
    fn require_admin_maps_to_denied() {
        let guest = Authorization::guest("walkin");
        assert!(guest.operator().is_ok());
        match guest.require_admin() {
            Err(EngineError::Denied { status, .. }) => assert_eq!(status, 403),
            other => panic!("expected Denied, got {other:?}"),
        }

        let anon = Authorization::Denied {
            reason: "expired session".into(),
            status: 401,
        };
        assert!(matches!(
            anon.operator(),
            Err(EngineError::Denied { status: 401, .. })
        ));
    }
}
