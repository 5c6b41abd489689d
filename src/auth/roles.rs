use std::fmt;

use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::user_roles;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Hr,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Hr => "hr",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "hr" => Some(Role::Hr),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keeps the recognised roles from `requested`, sorted and deduplicated.
pub fn allowed_roles<S: AsRef<str>>(requested: &[S]) -> Vec<Role> {
    let mut roles: Vec<Role> = requested
        .iter()
        .filter_map(|raw| Role::parse(raw.as_ref()))
        .collect();
    roles.sort();
    roles.dedup();
    roles
}

pub fn load_roles(conn: &mut PgConnection, user_id: Uuid) -> QueryResult<Vec<Role>> {
    let raw: Vec<String> = user_roles::table
        .filter(user_roles::user_id.eq(user_id))
        .select(user_roles::role)
        .load(conn)?;
    Ok(allowed_roles(raw.as_slice()))
}
