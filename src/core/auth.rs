//! Two-tier authorization.
//!
//! Super-admins come from `ADMIN_IDS`; admins are users promoted in the
//! registry. Every admin-only path asks [`Authz`] rather than checking flags
//! itself, and asks again on each event since promotion can change mid-flow.

use std::collections::BTreeSet;
use std::sync::Arc;

use itertools::Itertools;
use rusqlite::Connection;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::storage::users;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

#[derive(Debug, Clone, Default)]
pub struct Authz {
    super_admins: Arc<BTreeSet<i64>>,
}

impl Authz {
    pub fn new(super_admins: impl IntoIterator<Item = i64>) -> Self {
        Self {
            super_admins: Arc::new(super_admins.into_iter().collect()),
        }
    }

    /// Super-admins from `ADMIN_IDS`.
    pub fn from_config() -> Self {
        Self::new(config::admin::SUPER_ADMIN_IDS.iter().copied())
    }

    pub fn is_super_admin(&self, user_id: i64) -> bool {
        self.super_admins.contains(&user_id)
    }

    pub fn super_admins(&self) -> impl Iterator<Item = i64> + '_ {
        self.super_admins.iter().copied()
    }

    pub fn role(&self, conn: &Connection, user_id: i64) -> rusqlite::Result<Role> {
        if self.is_super_admin(user_id) {
            return Ok(Role::SuperAdmin);
        }
        Ok(if users::is_admin(conn, user_id)? {
            Role::Admin
        } else {
            Role::User
        })
    }

    pub fn is_admin(&self, conn: &Connection, user_id: i64) -> rusqlite::Result<bool> {
        Ok(self.role(conn, user_id)? >= Role::Admin)
    }

    /// Fails with `Unauthorized` unless the user holds at least `min`.
    pub fn require(&self, conn: &Connection, user_id: i64, min: Role) -> AppResult<Role> {
        let role = self.role(conn, user_id)?;
        if role >= min {
            Ok(role)
        } else {
            Err(AppError::Unauthorized(format!(
                "user {} has {:?}, needs {:?}",
                user_id, role, min
            )))
        }
    }

    /// Everyone who reviews payments: super-admins and promoted admins.
    pub fn admin_ids(&self, conn: &Connection) -> rusqlite::Result<Vec<i64>> {
        let promoted = users::list_admin_ids(conn)?;
        Ok(self.super_admins().chain(promoted).sorted().dedup().collect())
    }

    /// Gives every super-admin a registry row with the admin flag set.
    pub fn bootstrap(&self, conn: &Connection) -> rusqlite::Result<()> {
        for id in self.super_admins() {
            users::set_admin(conn, id)?;
        }
        if !self.super_admins.is_empty() {
            log::info!("Bootstrapped {} super-admin(s)", self.super_admins.len());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_conn;
    use pretty_assertions::assert_eq;

    #[test]
    fn roles_from_both_tiers() {
        let conn = test_conn();
        let authz = Authz::new([1]);
        users::ensure_user(&conn, 2, None).unwrap();
        users::set_admin(&conn, 2).unwrap();
        users::ensure_user(&conn, 3, None).unwrap();

        assert_eq!(authz.role(&conn, 1).unwrap(), Role::SuperAdmin);
        assert_eq!(authz.role(&conn, 2).unwrap(), Role::Admin);
        assert_eq!(authz.role(&conn, 3).unwrap(), Role::User);
        assert_eq!(authz.role(&conn, 4).unwrap(), Role::User);
    }

    #[test]
    fn require_rejects_lower_role() {
        let conn = test_conn();
        let authz = Authz::new([1]);
        users::set_admin(&conn, 2).unwrap();

        assert!(authz.require(&conn, 2, Role::Admin).is_ok());
        let err = authz.require(&conn, 2, Role::SuperAdmin).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        assert!(authz.require(&conn, 1, Role::SuperAdmin).is_ok());
    }

    #[test]
    fn admin_ids_merges_without_duplicates() {
        let conn = test_conn();
        let authz = Authz::new([5, 1]);
        authz.bootstrap(&conn).unwrap();
        users::set_admin(&conn, 3).unwrap();

        assert_eq!(authz.admin_ids(&conn).unwrap(), vec![1, 3, 5]);
    }

    #[test]
    fn revoked_promotion_takes_effect_immediately() {
        let conn = test_conn();
        let authz = Authz::new([]);
        users::set_admin(&conn, 8).unwrap();
        assert!(authz.is_admin(&conn, 8).unwrap());

        conn.execute("UPDATE users SET is_admin = 0 WHERE telegram_id = 8", []).unwrap();
        assert!(!authz.is_admin(&conn, 8).unwrap());
    }
}
