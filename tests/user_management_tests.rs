use sheetpilot::audit::AuditLog;
use sheetpilot::auth::{has_permission, Permission, Role, UserStore};
use std::sync::Arc;

fn store_with_audit() -> (UserStore, Arc<AuditLog>) {
    let audit = Arc::new(AuditLog::open_in_memory().unwrap());
    let users = UserStore::open_in_memory()
        .unwrap()
        .with_cost(4)
        .with_audit(Arc::clone(&audit));
    (users, audit)
}

#[test]
fn test_account_lifecycle_is_audited() {
    let (users, audit) = store_with_audit();

    assert!(users.add_user("alice", "secret", "editor").unwrap());
    assert!(!users.add_user("alice", "other", "viewer").unwrap());
    assert!(users.update_user_role("alice", "admin").unwrap());
    assert!(users.update_user_password("alice", "new-secret").unwrap());
    assert!(users.delete_user("alice").unwrap());
    assert!(!users.delete_user("alice").unwrap());

    let actions: Vec<String> = audit
        .recent(10)
        .unwrap()
        .into_iter()
        .rev()
        .map(|e| e.action_type)
        .collect();
    assert_eq!(
        actions,
        vec![
            "USER_CREATED_BY_ADMIN",
            "USER_CREATE_FAILED",
            "USER_ROLE_UPDATED_BY_ADMIN",
            "USER_PASSWORD_UPDATED_BY_ADMIN",
            "USER_DELETED_BY_ADMIN",
            "USER_DELETE_FAILED",
        ]
    );
}

#[test]
fn test_login_failure_reasons() {
    let (users, audit) = store_with_audit();
    users.add_user("bob", "hunter2", "user").unwrap();

    assert!(users.login_user("bob", "wrong").unwrap().is_none());
    assert!(users.login_user("nobody", "hunter2").unwrap().is_none());

    let entries = audit.recent(2).unwrap();
    assert_eq!(entries[0].action_type, "USER_LOGIN_FAILURE");
    assert_eq!(entries[0].details.as_ref().unwrap()["reason"], "User not found.");
    assert_eq!(entries[1].outcome, "FAILURE");
    assert_eq!(entries[1].details.as_ref().unwrap()["reason"], "Incorrect password.");
}

#[test]
fn test_login_success_returns_info() {
    let (users, audit) = store_with_audit();
    users.add_user("carol", "pw", "viewer").unwrap();

    let info = users.login_user("carol", "pw").unwrap().unwrap();
    assert_eq!(info.username, "carol");
    assert_eq!(info.role, "viewer");

    let latest = &audit.recent(1).unwrap()[0];
    assert_eq!(latest.action_type, "USER_LOGIN_SUCCESS");
    assert_eq!(latest.user_id, Some(info.id));
}

#[test]
fn test_lookup_by_id() {
    let (users, _) = store_with_audit();
    users.add_user("gina", "pw", "editor").unwrap();

    let by_name = users.get_user_by_username("gina").unwrap().unwrap();
    let by_id = users.get_user_by_id(by_name.id).unwrap().unwrap();
    assert_eq!(by_id.username, "gina");
    assert_eq!(by_id.role, "editor");
    assert!(users.get_user_by_id(by_name.id + 100).unwrap().is_none());
}

#[test]
fn test_password_change_takes_effect() {
    let (users, _) = store_with_audit();
    users.add_user("dave", "old", "user").unwrap();
    users.update_user_password("dave", "new").unwrap();

    assert!(users.login_user("dave", "old").unwrap().is_none());
    assert!(users.login_user("dave", "new").unwrap().is_some());
}

#[test]
fn test_updates_for_unknown_user() {
    let (users, audit) = store_with_audit();

    assert!(!users.update_user_role("ghost", "admin").unwrap());
    assert!(!users.update_user_password("ghost", "pw").unwrap());

    let entries = audit.recent(2).unwrap();
    assert_eq!(entries[0].action_type, "USER_PASSWORD_UPDATE_FAILED");
    assert_eq!(entries[1].action_type, "USER_ROLE_UPDATE_FAILED");
    assert_eq!(
        entries[1].details.as_ref().unwrap()["reason"],
        "User not found or role unchanged."
    );
}

#[test]
fn test_listing_hides_password_hashes() {
    let (users, _) = store_with_audit();
    users.add_user("erin", "pw", "admin").unwrap();
    users.add_user("frank", "pw", "viewer").unwrap();

    let listed = users.list_users().unwrap();
    let names: Vec<&str> = listed.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(names, vec!["erin", "frank"]);

    let json = serde_json::to_value(&listed).unwrap();
    assert!(json[0].get("hashed_password").is_none());

    let stored = users.get_user_by_username("erin").unwrap().unwrap();
    assert_ne!(stored.hashed_password, "pw");
    assert!(users.has_role("admin").unwrap());
    assert!(!users.has_role("editor").unwrap());
}

#[test]
fn test_role_permissions() {
    assert!(has_permission("admin", Permission::ManageUsers));
    assert!(has_permission("editor", Permission::RunPipelines));
    assert!(!has_permission("viewer", Permission::RunPipelines));
    assert!(!has_permission("Admin", Permission::ManageUsers));
    assert!("superuser".parse::<Role>().is_err());
}
