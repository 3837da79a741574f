//! Signed-in identity
//!
//! A `User` is owned by the auth store while signed in. The permission
//! matrix travels with the profile so the UI can hide actions a role cannot
//! take; it is advisory only, the backend remains the enforcer.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a staff member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Agent,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => f.write_str("admin"),
            Role::Agent => f.write_str("agent"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "agent" => Ok(Role::Agent),
            other => Err(format!("unknown role '{}' (expected admin or agent)", other)),
        }
    }
}

/// Resources covered by the permission matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Clients,
    Loans,
    Payments,
    Users,
    Reports,
}

impl Resource {
    pub const ALL: [Resource; 5] = [
        Resource::Clients,
        Resource::Loans,
        Resource::Payments,
        Resource::Users,
        Resource::Reports,
    ];
}

/// A single action on a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

/// Allowed actions for one resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub create: bool,
    #[serde(default)]
    pub update: bool,
    #[serde(default)]
    pub delete: bool,
}

impl Permissions {
    pub const ALL: Permissions = Permissions {
        read: true,
        create: true,
        update: true,
        delete: true,
    };

    pub const READ_ONLY: Permissions = Permissions {
        read: true,
        create: false,
        update: false,
        delete: false,
    };

    pub const NONE: Permissions = Permissions {
        read: false,
        create: false,
        update: false,
        delete: false,
    };

    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::Read => self.read,
            Action::Create => self.create,
            Action::Update => self.update,
            Action::Delete => self.delete,
        }
    }
}

/// Per-resource permissions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionMatrix(pub BTreeMap<Resource, Permissions>);

impl PermissionMatrix {
    /// Default matrix for a role
    ///
    /// Admins may do everything. Agents manage clients, loans and payments
    /// but cannot delete them, can read reports and have no access to users.
    pub fn for_role(role: Role) -> Self {
        let mut matrix = BTreeMap::new();
        for resource in Resource::ALL {
            let permissions = match (role, resource) {
                (Role::Admin, _) => Permissions::ALL,
                (Role::Agent, Resource::Clients | Resource::Loans | Resource::Payments) => {
                    Permissions {
                        read: true,
                        create: true,
                        update: true,
                        delete: false,
                    }
                }
                (Role::Agent, Resource::Reports) => Permissions::READ_ONLY,
                (Role::Agent, Resource::Users) => Permissions::NONE,
            };
            matrix.insert(resource, permissions);
        }
        Self(matrix)
    }

    /// Missing resources deny everything
    pub fn get(&self, resource: Resource) -> Permissions {
        self.0.get(&resource).copied().unwrap_or(Permissions::NONE)
    }

    pub fn set(&mut self, resource: Resource, permissions: Permissions) {
        self.0.insert(resource, permissions);
    }
}

/// Localization preferences of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Localization {
    pub language: String,
    pub timezone: String,
    pub currency: String,
}

impl Default for Localization {
    fn default() -> Self {
        Self {
            language: "es".to_string(),
            timezone: "UTC".to_string(),
            currency: "USD".to_string(),
        }
    }
}

/// Contact details, localization and permissions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub localization: Localization,
    #[serde(default)]
    pub permissions: PermissionMatrix,
}

/// A staff member able to sign in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    #[serde(default)]
    pub profile: UserProfile,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create an active user with the role's default permissions
    pub fn new(email: impl Into<String>, display_name: impl Into<String>, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.into(),
            display_name: display_name.into(),
            role,
            profile: UserProfile {
                permissions: PermissionMatrix::for_role(role),
                ..UserProfile::default()
            },
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether the profile grants `action` on `resource`
    ///
    /// Inactive users are denied everything.
    pub fn can(&self, resource: Resource, action: Action) -> bool {
        self.active && self.profile.permissions.get(resource).allows(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_can_do_everything() {
        let user = User::new("ana@example.com", "Ana", Role::Admin);
        for resource in Resource::ALL {
            assert!(user.can(resource, Action::Delete));
        }
    }

    #[test]
    fn test_agent_defaults() {
        let user = User::new("luis@example.com", "Luis", Role::Agent);
        assert!(user.can(Resource::Payments, Action::Create));
        assert!(!user.can(Resource::Payments, Action::Delete));
        assert!(user.can(Resource::Reports, Action::Read));
        assert!(!user.can(Resource::Users, Action::Read));
    }

    #[test]
    fn test_inactive_user_is_denied() {
        let mut user = User::new("ana@example.com", "Ana", Role::Admin);
        user.active = false;
        assert!(!user.can(Resource::Clients, Action::Read));
    }

    #[test]
    fn test_missing_resource_denies() {
        let matrix = PermissionMatrix::default();
        assert_eq!(matrix.get(Resource::Loans), Permissions::NONE);
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("agent".parse::<Role>().unwrap(), Role::Agent);
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_permissions_serialize_as_map() {
        let user = User::new("ana@example.com", "Ana", Role::Agent);
        let json = serde_json::to_value(&user.profile.permissions).unwrap();
        assert_eq!(json["payments"]["create"], true);
        assert_eq!(json["users"]["read"], false);
    }
}
