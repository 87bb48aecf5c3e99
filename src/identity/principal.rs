use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type UserId = u64;

/// Privilege tier. Ordering is meaningful: `Admin` outranks `User`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self { Role::User => "USER", Role::Admin => "ADMIN" }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// The authenticated subject of the current request. Lives for one request only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub id: UserId,
    pub display_name: String,
    pub role: Role,
}

impl CallerIdentity {
    pub fn new<S: Into<String>>(id: UserId, display_name: S, role: Role) -> Self {
        Self { id, display_name: display_name.into(), role }
    }

    pub fn is_admin(&self) -> bool { self.role == Role::Admin }
}
