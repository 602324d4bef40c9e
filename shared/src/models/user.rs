//! User profile and role models

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ParseEnumError;
use crate::types::Language;

/// A user account, always bound to one company
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub company_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub preferred_language: Language,
    pub role: AppRole,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Role assigned to a user within their company
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppRole {
    Admin,
    Editor,
    Viewer,
}

/// Resources that can be accessed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Product,
    Location,
    Customer,
    Movement,
    Stock,
    Import,
    Export,
    User,
    Audit,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Product => "product",
            Resource::Location => "location",
            Resource::Customer => "customer",
            Resource::Movement => "movement",
            Resource::Stock => "stock",
            Resource::Import => "import",
            Resource::Export => "export",
            Resource::User => "user",
            Resource::Audit => "audit",
        }
    }
}

/// Actions that can be performed on resources
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    View,
    Create,
    Edit,
    Delete,
    Cancel,
    Manage,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "delete",
            Action::Cancel => "cancel",
            Action::Manage => "manage",
        }
    }
}

/// A permission granting actions on a resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Permission {
    pub resource: Resource,
    pub actions: Vec<Action>,
}

impl Permission {
    fn new(resource: Resource, actions: &[Action]) -> Self {
        Self {
            resource,
            actions: actions.to_vec(),
        }
    }
}

fn viewer_permissions() -> Vec<Permission> {
    vec![
        Permission::new(Resource::Product, &[Action::View]),
        Permission::new(Resource::Location, &[Action::View]),
        Permission::new(Resource::Customer, &[Action::View]),
        Permission::new(Resource::Movement, &[Action::View]),
        Permission::new(Resource::Stock, &[Action::View]),
        Permission::new(Resource::Export, &[Action::View]),
    ]
}

fn editor_permissions() -> Vec<Permission> {
    vec![
        Permission::new(Resource::Product, &[Action::View, Action::Create, Action::Edit]),
        Permission::new(Resource::Location, &[Action::View, Action::Create, Action::Edit]),
        Permission::new(Resource::Customer, &[Action::View, Action::Create, Action::Edit]),
        Permission::new(
            Resource::Movement,
            &[Action::View, Action::Create, Action::Cancel],
        ),
        Permission::new(Resource::Stock, &[Action::View]),
        Permission::new(Resource::Import, &[Action::Create]),
        Permission::new(Resource::Export, &[Action::View]),
    ]
}

fn admin_permissions() -> Vec<Permission> {
    let full = [Action::View, Action::Create, Action::Edit, Action::Delete];
    vec![
        Permission::new(Resource::Product, &full),
        Permission::new(Resource::Location, &full),
        Permission::new(Resource::Customer, &full),
        Permission::new(
            Resource::Movement,
            &[Action::View, Action::Create, Action::Cancel],
        ),
        Permission::new(Resource::Stock, &[Action::View]),
        Permission::new(Resource::Import, &[Action::Create]),
        Permission::new(Resource::Export, &[Action::View]),
        Permission::new(Resource::User, &[Action::View, Action::Manage]),
        Permission::new(Resource::Audit, &[Action::View]),
    ]
}

impl AppRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppRole::Admin => "admin",
            AppRole::Editor => "editor",
            AppRole::Viewer => "viewer",
        }
    }

    /// Structured permissions granted by this role
    pub fn permissions(&self) -> Vec<Permission> {
        match self {
            AppRole::Admin => admin_permissions(),
            AppRole::Editor => editor_permissions(),
            AppRole::Viewer => viewer_permissions(),
        }
    }

    /// Permissions flattened to `resource:action` strings (as carried in access tokens)
    pub fn permission_strings(&self) -> Vec<String> {
        self.permissions()
            .iter()
            .flat_map(|p| {
                p.actions
                    .iter()
                    .map(move |a| format!("{}:{}", p.resource.as_str(), a.as_str()))
            })
            .collect()
    }

    pub fn can(&self, resource: Resource, action: Action) -> bool {
        self.permissions()
            .iter()
            .any(|p| p.resource == resource && p.actions.contains(&action))
    }
}

impl fmt::Display for AppRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppRole {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(AppRole::Admin),
            "editor" => Ok(AppRole::Editor),
            "viewer" => Ok(AppRole::Viewer),
            other => Err(ParseEnumError::new("role", other)),
        }
    }
}
