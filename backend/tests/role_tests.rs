//! Role and permission tests
//!
//! Viewers only read, editors manage stock but cannot delete or administer users,
//! admins hold every permission of the other roles.

use shared::{Action, AppRole, Resource};

const RESOURCES: [Resource; 9] = [
    Resource::Product,
    Resource::Location,
    Resource::Customer,
    Resource::Movement,
    Resource::Stock,
    Resource::Import,
    Resource::Export,
    Resource::User,
    Resource::Audit,
];

const ACTIONS: [Action; 6] = [
    Action::View,
    Action::Create,
    Action::Edit,
    Action::Delete,
    Action::Cancel,
    Action::Manage,
];

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_viewer_cannot_mutate() {
        for resource in RESOURCES {
            for action in ACTIONS {
                if action != Action::View {
                    assert!(
                        !AppRole::Viewer.can(resource, action),
                        "viewer may {}:{}",
                        resource.as_str(),
                        action.as_str()
                    );
                }
            }
        }
        assert!(AppRole::Viewer.can(Resource::Stock, Action::View));
        assert!(!AppRole::Viewer.can(Resource::Audit, Action::View));
        assert!(!AppRole::Viewer.can(Resource::User, Action::View));
    }

    #[test]
    fn test_editor_permissions() {
        assert!(AppRole::Editor.can(Resource::Product, Action::Create));
        assert!(AppRole::Editor.can(Resource::Movement, Action::Cancel));
        assert!(AppRole::Editor.can(Resource::Import, Action::Create));
        assert!(!AppRole::Editor.can(Resource::Product, Action::Delete));
        assert!(!AppRole::Editor.can(Resource::Location, Action::Delete));
        assert!(!AppRole::Editor.can(Resource::User, Action::Manage));
        assert!(!AppRole::Editor.can(Resource::Audit, Action::View));
    }

    #[test]
    fn test_movements_are_never_edited_or_deleted() {
        for role in [AppRole::Admin, AppRole::Editor, AppRole::Viewer] {
            assert!(!role.can(Resource::Movement, Action::Edit));
            assert!(!role.can(Resource::Movement, Action::Delete));
        }
    }

    #[test]
    fn test_admin_includes_lower_roles() {
        for lower in [AppRole::Editor, AppRole::Viewer] {
            for resource in RESOURCES {
                for action in ACTIONS {
                    if lower.can(resource, action) {
                        assert!(AppRole::Admin.can(resource, action));
                    }
                }
            }
        }
        assert!(AppRole::Admin.can(Resource::User, Action::Manage));
        assert!(AppRole::Admin.can(Resource::Customer, Action::Delete));
    }

    #[test]
    fn test_permission_strings() {
        let viewer = AppRole::Viewer.permission_strings();
        assert_eq!(
            viewer,
            vec![
                "product:view",
                "location:view",
                "customer:view",
                "movement:view",
                "stock:view",
                "export:view",
            ]
        );

        let admin = AppRole::Admin.permission_strings();
        assert!(admin.contains(&"movement:cancel".to_string()));
        assert!(admin.contains(&"audit:view".to_string()));
        assert!(!admin.contains(&"movement:delete".to_string()));
    }

    #[test]
    fn test_role_parsing() {
        for role in [AppRole::Admin, AppRole::Editor, AppRole::Viewer] {
            assert_eq!(role.as_str().parse::<AppRole>().unwrap(), role);
        }
        assert!("owner".parse::<AppRole>().is_err());
        assert_eq!(
            serde_json::to_string(&AppRole::Editor).unwrap(),
            "\"editor\""
        );
    }
}
