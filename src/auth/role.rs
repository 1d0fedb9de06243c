//! The two kinds of family member.

use std::{fmt::Display, str::FromStr};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// A user's role decides what they may see and do.
///
/// The role is fixed when the user registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A parent: sees every transaction, creates approved transactions and
    /// approves or declines pending ones.
    Admin,
    /// Sees and submits only their own transactions.
    Child,
}

impl Role {
    /// The lowercase name used in the database and in JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Child => "child",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "child" => Ok(Role::Child),
            other => Err(format!("unknown role \"{other}\"")),
        }
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: String| FromSqlError::Other(error.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::Role;

    #[test]
    fn serializes_as_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(serde_json::to_string(&Role::Child).unwrap(), "\"child\"");
    }

    #[test]
    fn rejects_unknown_role() {
        assert!(serde_json::from_str::<Role>("\"parent\"").is_err());
        assert!("superuser".parse::<Role>().is_err());
    }
}
