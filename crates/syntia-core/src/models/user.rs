// ABOUTME: Internal CRM user identity and role model
// ABOUTME: Role decides whether data access is global or limited to assigned clients
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// CRM role as stored in `usuarios.rol`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UserRole {
    /// Company owner, sees everything
    Owner,
    /// Administrator, sees everything
    Administrador,
    /// Sales advisor, sees only assigned clients
    Asesor,
    /// Any other role string, treated as non-privileged
    Other(String),
}

impl UserRole {
    /// Parse a database role string
    #[must_use]
    pub fn from_db(value: &str) -> Self {
        match value.trim().to_uppercase().as_str() {
            "OWNER" => Self::Owner,
            "ADMINISTRADOR" | "ADMIN" | "ADMINISTRATOR" => Self::Administrador,
            "ASESOR" => Self::Asesor,
            _ => Self::Other(value.to_owned()),
        }
    }

    /// Database representation of the role
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Owner => "OWNER",
            Self::Administrador => "ADMINISTRADOR",
            Self::Asesor => "ASESOR",
            Self::Other(raw) => raw,
        }
    }

    /// Whether the role may query data across all clients
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Owner | Self::Administrador)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for UserRole {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for UserRole {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_db(&raw))
    }
}

/// Internal user resolved from an identity-provider account
///
/// Loaded once per request and never mutated while the request runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Internal user ID (`usuarios.id_usuario`)
    pub id: String,
    /// CRM role
    pub role: UserRole,
    /// Identity-provider account ID
    pub auth_user_id: String,
}

impl User {
    /// Whether this user may query data across all clients
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}
