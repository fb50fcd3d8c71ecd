//! Caller identity, roles, and the per-request ownership rule.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

/// The two account roles. No hierarchy beyond them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Role> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => anyhow::bail!("unknown role: {other}"),
        }
    }
}

/// Authenticated caller, decoded from the access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub id: Uuid,
    pub role: Role,
}

/// Who created a record. The role tag travels with the id so that resolving
/// the creator is exhaustive at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Creator {
    User(Uuid),
    Admin(Uuid),
}

impl Creator {
    pub fn from_parts(id: Uuid, role: Role) -> Creator {
        match role {
            Role::User => Creator::User(id),
            Role::Admin => Creator::Admin(id),
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Creator::User(id) | Creator::Admin(id) => *id,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Creator::User(_) => Role::User,
            Creator::Admin(_) => Role::Admin,
        }
    }
}

impl From<Caller> for Creator {
    fn from(caller: Caller) -> Creator {
        Creator::from_parts(caller.id, caller.role)
    }
}

/// Read scope: admins are unscoped; users see only their own user-created
/// records.
pub fn can_read(caller: Caller, creator: Creator) -> bool {
    match caller.role {
        Role::Admin => true,
        Role::User => creator == Creator::User(caller.id),
    }
}

/// Mutation scope: admins, or the record's creator.
pub fn can_mutate(caller: Caller, creator: Creator) -> bool {
    caller.role == Role::Admin || creator.id() == caller.id
}

pub fn ensure_read(caller: Caller, creator: Creator) -> Result<(), ApiError> {
    if can_read(caller, creator) {
        Ok(())
    } else {
        Err(ApiError::forbidden("You do not have access to this record"))
    }
}

pub fn ensure_mutate(caller: Caller, creator: Creator) -> Result<(), ApiError> {
    if can_mutate(caller, creator) {
        Ok(())
    } else {
        Err(ApiError::forbidden("You cannot modify this record"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: Uuid) -> Caller {
        Caller {
            id,
            role: Role::User,
        }
    }

    fn admin(id: Uuid) -> Caller {
        Caller {
            id,
            role: Role::Admin,
        }
    }

    #[test]
    fn owner_reads_and_mutates_own_record() {
        let id = Uuid::new_v4();
        let creator = Creator::User(id);
        assert!(can_read(user(id), creator));
        assert!(can_mutate(user(id), creator));
    }

    #[test]
    fn other_user_is_denied() {
        let creator = Creator::User(Uuid::new_v4());
        let stranger = user(Uuid::new_v4());
        assert!(!can_read(stranger, creator));
        assert!(!can_mutate(stranger, creator));
    }

    #[test]
    fn admin_is_unscoped() {
        let creator = Creator::User(Uuid::new_v4());
        let caller = admin(Uuid::new_v4());
        assert!(can_read(caller, creator));
        assert!(can_mutate(caller, creator));
    }

    #[test]
    fn user_cannot_read_admin_created_record_with_own_id() {
        // Same id, but the record was created through an admin account.
        let id = Uuid::new_v4();
        assert!(!can_read(user(id), Creator::Admin(id)));
        // Mutation goes by id alone, matching the write rule.
        assert!(can_mutate(user(id), Creator::Admin(id)));
    }

    #[test]
    fn denial_is_forbidden_not_not_found() {
        let creator = Creator::User(Uuid::new_v4());
        let err = ensure_read(user(Uuid::new_v4()), creator).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn role_round_trip() {
        assert_eq!(Role::parse("user").unwrap(), Role::User);
        assert_eq!(Role::parse("admin").unwrap(), Role::Admin);
        assert!(Role::parse("root").is_err());
        assert_eq!(Role::Admin.as_str(), "admin");
    }
}
