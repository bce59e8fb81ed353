use super::models::Role;
use super::privileged::{
    CreateAdminAccountRequest, DeleteAccountRequest, GetUserInfoRequest, ResetPasswordRequest,
};
use super::*;
use crate::firestore::reference::convert_serializable_to_fields;
use chrono::{NaiveDate, TimeZone, Utc};
use httpmock::prelude::*;
use reqwest::Client;
use reqwest_middleware::ClientBuilder;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};

const AUTH: &str = "/v1/projects/test-project";
const DOCS: &str = "/v1/projects/test-project/databases/(default)/documents";
const DOC_NAMES: &str = "projects/test-project/databases/(default)/documents";
const GIF: &[u8] = b"GIF89a\x01\x00\x01\x00";

fn test_console(server: &MockServer) -> Console {
    let client = || ClientBuilder::new(Client::new()).build();
    Console::new(
        FirebaseAuth::new_with_client(client(), server.url(AUTH)).with_api_key("web-key"),
        FirebaseFirestore::new_with_client(client(), server.url(DOCS)),
        FirebaseStorage::new_with_client(client(), server.url("/storage/v1"), "test-bucket"),
    )
}

fn fields(data: &Value) -> Value {
    json!(convert_serializable_to_fields(data).unwrap())
}

fn document(path: &str, data: Value) -> Value {
    json!({ "name": format!("{DOC_NAMES}/{path}"), "fields": fields(&data) })
}

fn query_results(documents: Vec<Value>) -> Value {
    let mut results: Vec<Value> = documents
        .into_iter()
        .map(|doc| json!({ "document": doc, "readTime": "2024-03-10T00:00:00Z" }))
        .collect();
    if results.is_empty() {
        results.push(json!({ "readTime": "2024-03-10T00:00:00Z" }));
    }
    Value::Array(results)
}

fn equal(field: &str, value: Value) -> Value {
    json!({ "fieldFilter": { "field": { "fieldPath": field }, "op": "EQUAL", "value": value } })
}

fn pending_query(email: &str) -> Value {
    json!({
        "structuredQuery": {
            "from": [{ "collectionId": "users" }],
            "where": { "compositeFilter": { "op": "AND", "filters": [
                equal("email", json!({ "stringValue": email })),
                equal("pending", json!({ "booleanValue": true }))
            ] } }
        }
    })
}

fn profile(email: &str, role: &str) -> Value {
    json!({
        "email": email,
        "name": "Test User",
        "role": role,
        "isOnline": false,
        "createdAt": "2024-01-01T00:00:00Z"
    })
}

fn mock_profile(server: &MockServer, uid: &str, email: &str, role: &str) {
    let body = document(&format!("users/{uid}"), profile(email, role));
    server.mock(|when, then| {
        when.method(GET).path(format!("{DOCS}/users/{uid}"));
        then.status(200).json_body(body);
    });
}

fn mock_pending_lookup(server: &MockServer, email: &str, placeholders: Vec<Value>) {
    let results = query_results(placeholders);
    server.mock(|when, then| {
        when.method(POST)
            .path(format!("{DOCS}:runQuery"))
            .json_body(pending_query(email));
        then.status(200).json_body(results);
    });
}

fn mock_auth_lookup(server: &MockServer, email: &str, user: Option<Value>) {
    let body = match user {
        Some(user) => json!({ "users": [user] }),
        None => json!({}),
    };
    server.mock(|when, then| {
        when.method(POST)
            .path(format!("{AUTH}/accounts:lookup"))
            .json_body(json!({ "email": [email] }));
        then.status(200).json_body(body);
    });
}

fn auth_error(message: &str) -> Value {
    json!({ "error": { "code": 400, "message": message } })
}

fn sign_in_reply(uid: &str) -> Value {
    json!({
        "localId": uid,
        "idToken": "id-token",
        "refreshToken": "refresh-token",
        "expiresIn": "3600"
    })
}

fn email_query(email: &str) -> Value {
    json!({
        "structuredQuery": {
            "from": [{ "collectionId": "users" }],
            "where": equal("email", json!({ "stringValue": email }))
        }
    })
}

// Serves `replies` one after another, repeating the last one.
fn in_turn(replies: Vec<(u16, Value)>) -> impl Fn(&HttpMockRequest) -> HttpMockResponse + Send + Sync + 'static {
    let served = AtomicUsize::new(0);
    move |_| {
        let n = served.fetch_add(1, Ordering::SeqCst).min(replies.len() - 1);
        let (status, body) = &replies[n];
        HttpMockResponse::builder()
            .status(*status)
            .header("content-type", "application/json")
            .body(body.to_string())
            .build()
    }
}

fn not_found_reply() -> Value {
    json!({ "error": { "code": 404, "message": "Document not found", "status": "NOT_FOUND" } })
}

fn swap_commit(uid: &str, profile: &Value, old_id: &str) -> Value {
    json!({
        "writes": [
            {
                "update": { "name": format!("{DOC_NAMES}/users/{uid}"), "fields": fields(profile) },
                "currentDocument": { "exists": false }
            },
            { "delete": format!("{DOC_NAMES}/users/{old_id}") }
        ]
    })
}

fn placeholder(email: &str, password: &str) -> Value {
    json!({
        "email": email,
        "name": "Pending Admin",
        "role": "admin",
        "isOnline": false,
        "createdAt": "2024-01-01T00:00:00Z",
        "pending": true,
        "pendingPasswordHash": pending_password_hash(email, password)
    })
}

fn activated_profile(email: &str) -> Value {
    json!({
        "email": email,
        "name": "Pending Admin",
        "role": "admin",
        "isOnline": false,
        "createdAt": "2024-01-01T00:00:00Z"
    })
}

// --- admin policy -------------------------------------------------------

#[tokio::test]
async fn test_require_admin() {
    let server = MockServer::start();
    let console = test_console(&server);
    mock_profile(&server, "admin-1", "admin@example.com", "admin");
    mock_profile(&server, "user-1", "user@example.com", "user");

    let admin = console.require_admin("admin-1").await.unwrap();
    assert_eq!(admin.email, "admin@example.com");

    assert!(matches!(
        console.require_admin("user-1").await,
        Err(AdminError::PermissionDenied(_))
    ));
    assert!(matches!(
        console.require_admin("nobody").await,
        Err(AdminError::PermissionDenied(_))
    ));
    assert!(matches!(console.require_admin("").await, Err(AdminError::Unauthenticated)));
}

#[test]
fn test_validation_helpers() {
    assert!(validate_email("admin@example.com").is_ok());
    for bad in ["", "admin", "@example.com", "admin@example", "admin@.com", "a b@example.com"] {
        assert!(validate_email(bad).is_err(), "{bad:?}");
    }
    assert!(validate_password("123456").is_ok());
    assert!(validate_password("12345").is_err());
    assert_eq!(validate_name("  Ana ").unwrap(), "Ana");
    assert!(validate_name("   ").is_err());
    assert_eq!(
        pending_password_hash(" Admin@Example.com", "secret1"),
        pending_password_hash("admin@example.com", "secret1")
    );
}

// --- accounts -----------------------------------------------------------

#[tokio::test]
async fn test_login_marks_admin_online() {
    let server = MockServer::start();
    let console = test_console(&server);

    server.mock(|when, then| {
        when.method(POST)
            .path("/v1/accounts:signInWithPassword")
            .query_param("key", "web-key");
        then.status(200).json_body(json!({
            "localId": "admin-1",
            "email": "admin@example.com",
            "idToken": "id-token",
            "refreshToken": "refresh-token",
            "expiresIn": "3600"
        }));
    });
    mock_profile(&server, "admin-1", "admin@example.com", "admin");
    let online = server.mock(|when, then| {
        when.method(PATCH)
            .path(format!("{DOCS}/users/admin-1"))
            .query_param("currentDocument.exists", "true");
        then.status(200).json_body(json!({}));
    });

    let session = console.accounts().login(" Admin@Example.com ", "secret1").await.unwrap();
    assert_eq!(session.uid, "admin-1");
    assert_eq!(session.id_token, "id-token");
    assert_eq!(session.expires_in, 3600);
    online.assert();
}

#[tokio::test]
async fn test_login_rejects_non_admin() {
    let server = MockServer::start();
    let console = test_console(&server);

    server.mock(|when, then| {
        when.method(POST).path("/v1/accounts:signInWithPassword");
        then.status(200).json_body(json!({
            "localId": "user-1",
            "idToken": "id-token",
            "refreshToken": "refresh-token",
            "expiresIn": "3600"
        }));
    });
    mock_profile(&server, "user-1", "user@example.com", "user");

    // No PATCH is mocked: touching the online flag would surface as NotFound.
    let err = console.accounts().login("user@example.com", "secret1").await.unwrap_err();
    assert!(matches!(err, AdminError::NotAdmin));
}

#[tokio::test]
async fn test_login_wrong_password() {
    let server = MockServer::start();
    let console = test_console(&server);

    server.mock(|when, then| {
        when.method(POST).path("/v1/accounts:signInWithPassword");
        then.status(400).json_body(auth_error("INVALID_PASSWORD"));
    });

    let err = console.accounts().login("admin@example.com", "nope123").await.unwrap_err();
    assert!(matches!(err, AdminError::InvalidCredentials));
    assert_eq!(err.user_message(), "Invalid email or password.");
}

#[tokio::test]
async fn test_login_unknown_email_without_placeholder() {
    let server = MockServer::start();
    let console = test_console(&server);

    server.mock(|when, then| {
        when.method(POST).path("/v1/accounts:signInWithPassword");
        then.status(400).json_body(auth_error("INVALID_LOGIN_CREDENTIALS"));
    });
    mock_pending_lookup(&server, "ghost@example.com", vec![]);

    let err = console.accounts().login("ghost@example.com", "secret1").await.unwrap_err();
    assert!(matches!(err, AdminError::InvalidCredentials));
}

#[tokio::test]
async fn test_pending_admin_first_login() {
    let server = MockServer::start();
    let console = test_console(&server);
    let email = "pending@example.com";

    // Unknown to the auth service until the activation created the account.
    server.mock(|when, then| {
        when.method(POST).path("/v1/accounts:signInWithPassword");
        then.respond_with(in_turn(vec![
            (400, auth_error("EMAIL_NOT_FOUND")),
            (200, sign_in_reply("new-uid")),
        ]));
    });
    mock_pending_lookup(&server, email, vec![document("users/pending-1", placeholder(email, "secret1"))]);

    let create = server.mock(|when, then| {
        when.method(POST).path(format!("{AUTH}/accounts")).json_body(json!({
            "email": email,
            "password": "secret1",
            "displayName": "Pending Admin"
        }));
        then.status(200).json_body(json!({ "localId": "new-uid", "email": email }));
    });

    let new_profile = activated_profile(email);
    let stored = document("users/new-uid", new_profile.clone());
    server.mock(|when, then| {
        when.method(GET).path(format!("{DOCS}/users/new-uid"));
        then.respond_with(in_turn(vec![(404, not_found_reply()), (200, stored)]));
    });
    let commit = server.mock(|when, then| {
        when.method(POST)
            .path(format!("{DOCS}:commit"))
            .json_body(swap_commit("new-uid", &new_profile, "pending-1"));
        then.status(200).json_body(json!({ "writeResults": [{}, {}] }));
    });
    let online = server.mock(|when, then| {
        when.method(PATCH).path(format!("{DOCS}/users/new-uid"));
        then.status(200).json_body(json!({}));
    });

    let session = console.accounts().login(email, "secret1").await.unwrap();
    assert_eq!(session.uid, "new-uid");
    assert_eq!(session.name, "Pending Admin");
    assert_eq!(session.id_token, "id-token");
    create.assert();
    commit.assert();
    online.assert();
}

#[tokio::test]
async fn test_login_finishes_interrupted_activation() {
    let server = MockServer::start();
    let console = test_console(&server);
    let email = "pending@example.com";

    // The auth account exists, but the placeholder was never swapped.
    server.mock(|when, then| {
        when.method(POST).path("/v1/accounts:signInWithPassword");
        then.status(200).json_body(sign_in_reply("new-uid"));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path(format!("{DOCS}:runQuery"))
            .json_body(email_query(email));
        then.status(200)
            .json_body(query_results(vec![document("users/pending-1", placeholder(email, "secret1"))]));
    });
    let commit = server.mock(|when, then| {
        when.method(POST)
            .path(format!("{DOCS}:commit"))
            .json_body(swap_commit("new-uid", &activated_profile(email), "pending-1"));
        then.status(200).json_body(json!({ "writeResults": [{}, {}] }));
    });
    let online = server.mock(|when, then| {
        when.method(PATCH).path(format!("{DOCS}/users/new-uid"));
        then.status(200).json_body(json!({}));
    });

    let session = console.accounts().login(email, "secret1").await.unwrap();
    assert_eq!(session.uid, "new-uid");
    commit.assert();
    online.assert();
}

#[tokio::test]
async fn test_login_migrates_profile_to_auth_uid() {
    let server = MockServer::start();
    let console = test_console(&server);

    server.mock(|when, then| {
        when.method(POST).path("/v1/accounts:signInWithPassword");
        then.status(200).json_body(sign_in_reply("auth-uid"));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path(format!("{DOCS}:runQuery"))
            .json_body(email_query("admin@example.com"));
        then.status(200).json_body(query_results(vec![document(
            "users/legacy-1",
            profile("admin@example.com", "admin"),
        )]));
    });

    let mut migrated = profile("admin@example.com", "admin");
    migrated["migratedFrom"] = json!("legacy-1");
    let commit = server.mock(|when, then| {
        when.method(POST)
            .path(format!("{DOCS}:commit"))
            .json_body(swap_commit("auth-uid", &migrated, "legacy-1"));
        then.status(200).json_body(json!({ "writeResults": [{}, {}] }));
    });
    let online = server.mock(|when, then| {
        when.method(PATCH).path(format!("{DOCS}/users/auth-uid"));
        then.status(200).json_body(json!({}));
    });

    let session = console.accounts().login("admin@example.com", "secret1").await.unwrap();
    assert_eq!(session.uid, "auth-uid");
    assert_eq!(session.email, "admin@example.com");
    commit.assert();
    online.assert();
}

#[tokio::test]
async fn test_logout_marks_admin_offline() {
    let server = MockServer::start();
    let console = test_console(&server);

    let offline = server.mock(|when, then| {
        when.method(PATCH)
            .path(format!("{DOCS}/users/admin-1"))
            .query_param("updateMask.fieldPaths", "isOnline")
            .json_body(json!({ "fields": { "isOnline": { "booleanValue": false } } }));
        then.status(200).json_body(json!({}));
    });

    console.accounts().logout("admin-1").await.unwrap();
    offline.assert();
}

#[tokio::test]
async fn test_rename_user() {
    let server = MockServer::start();
    let console = test_console(&server);

    let auth_update = server.mock(|when, then| {
        when.method(POST)
            .path(format!("{AUTH}/accounts:update"))
            .json_body(json!({ "localId": "user-1", "displayName": "Ana" }));
        then.status(200).json_body(json!({ "localId": "user-1" }));
    });
    let profile_update = server.mock(|when, then| {
        when.method(PATCH)
            .path(format!("{DOCS}/users/user-1"))
            .query_param("updateMask.fieldPaths", "name")
            .json_body(json!({ "fields": { "name": { "stringValue": "Ana" } } }));
        then.status(200).json_body(json!({}));
    });

    console.accounts().rename_user("user-1", "  Ana ").await.unwrap();
    auth_update.assert();
    profile_update.assert();
}

#[tokio::test]
async fn test_rename_pending_admin_without_auth_account() {
    let server = MockServer::start();
    let console = test_console(&server);

    server.mock(|when, then| {
        when.method(POST).path(format!("{AUTH}/accounts:update"));
        then.status(400).json_body(auth_error("USER_NOT_FOUND"));
    });
    let profile_update = server.mock(|when, then| {
        when.method(PATCH).path(format!("{DOCS}/users/pending-1"));
        then.status(200).json_body(json!({}));
    });

    console.accounts().rename_user("pending-1", "Ana").await.unwrap();
    profile_update.assert();
}

#[tokio::test]
async fn test_pending_admin_wrong_password_is_invalid_credentials() {
    let server = MockServer::start();
    let console = test_console(&server);
    let email = "pending@example.com";

    server.mock(|when, then| {
        when.method(POST).path("/v1/accounts:signInWithPassword");
        then.status(400).json_body(auth_error("EMAIL_NOT_FOUND"));
    });
    let placeholder = json!({
        "email": email,
        "name": "Pending Admin",
        "role": "admin",
        "isOnline": false,
        "createdAt": "2024-01-01T00:00:00Z",
        "pending": true,
        "pendingPasswordHash": pending_password_hash(email, "secret1")
    });
    mock_pending_lookup(&server, email, vec![document("users/pending-1", placeholder)]);

    let err = console.accounts().login(email, "other-pw").await.unwrap_err();
    assert!(matches!(err, AdminError::InvalidCredentials));
}

#[tokio::test]
async fn test_create_pending_admin() {
    let server = MockServer::start();
    let console = test_console(&server);

    mock_auth_lookup(&server, "new@example.com", None);
    mock_pending_lookup(&server, "new@example.com", vec![]);
    let add = server.mock(|when, then| {
        when.method(POST).path(format!("{DOCS}/users"));
        then.status(200).json_body(json!({ "name": format!("{DOC_NAMES}/users/auto-1") }));
    });

    let id = console
        .accounts()
        .create_pending_admin("New Admin", "New@Example.com", "secret1")
        .await
        .unwrap();
    assert_eq!(id, "auto-1");
    add.assert();
}

#[tokio::test]
async fn test_create_pending_admin_rejects_existing_account() {
    let server = MockServer::start();
    let console = test_console(&server);

    mock_auth_lookup(
        &server,
        "taken@example.com",
        Some(json!({ "localId": "u1", "email": "taken@example.com" })),
    );

    let err = console
        .accounts()
        .create_pending_admin("Someone", "taken@example.com", "secret1")
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::AlreadyExists(_)));
}

#[tokio::test]
async fn test_list_users_newest_first() {
    let server = MockServer::start();
    let console = test_console(&server);

    let mut pending = profile("p@example.com", "admin");
    pending["createdAt"] = json!("2024-03-01T00:00:00Z");
    pending["pending"] = json!(true);
    pending["pendingPasswordHash"] = json!("abc");
    let mut recent = profile("new@example.com", "user");
    recent["createdAt"] = json!("2024-02-01T00:00:00Z");

    server.mock(|when, then| {
        when.method(GET).path(format!("{DOCS}/users"));
        then.status(200).json_body(json!({
            "documents": [
                document("users/old", profile("old@example.com", "admin")),
                document("users/placeholder", pending),
                document("users/new", recent)
            ]
        }));
    });

    let users = console.accounts().list_users().await.unwrap();
    let ids: Vec<&str> = users.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec!["placeholder", "new", "old"]);
    assert!(users[0].pending);
    assert!(!users[1].pending);

    let listed = serde_json::to_value(&users[0]).unwrap();
    assert!(listed.get("pendingPasswordHash").is_none());
}

#[tokio::test]
async fn test_set_role() {
    let server = MockServer::start();
    let console = test_console(&server);

    let err = console
        .accounts()
        .set_role("admin-1", "admin-1", Role::User)
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::PermissionDenied(_)));

    let update = server.mock(|when, then| {
        when.method(PATCH)
            .path(format!("{DOCS}/users/user-1"))
            .query_param("updateMask.fieldPaths", "role")
            .json_body(json!({ "fields": { "role": { "stringValue": "admin" } } }));
        then.status(200).json_body(json!({}));
    });
    console.accounts().set_role("admin-1", "user-1", Role::Admin).await.unwrap();
    update.assert();

    server.mock(|when, then| {
        when.method(PATCH).path(format!("{DOCS}/users/ghost"));
        then.status(404).json_body(json!({
            "error": { "code": 404, "message": "No document to update", "status": "NOT_FOUND" }
        }));
    });
    let err = console.accounts().set_role("admin-1", "ghost", Role::Admin).await.unwrap_err();
    assert_eq!(err.user_message(), "No user with id ghost.");
}

// --- privileged ---------------------------------------------------------

fn create_request(email: &str) -> CreateAdminAccountRequest {
    CreateAdminAccountRequest {
        name: "New Admin".to_string(),
        email: email.to_string(),
        password: "secret1".to_string(),
        caller_id: None,
    }
}

#[tokio::test]
async fn test_privileged_operations_require_admin() {
    let server = MockServer::start();
    let console = test_console(&server);
    mock_profile(&server, "user-1", "user@example.com", "user");

    let err = console
        .privileged()
        .create_admin_account("user-1", create_request("new@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::PermissionDenied(_)));
    assert_eq!(err.kind().callable_status(), "PERMISSION_DENIED");

    let err = console
        .privileged()
        .get_user_info(
            "user-1",
            GetUserInfoRequest {
                email: "a@example.com".to_string(),
                caller_id: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::PermissionDenied(_)));
}

#[tokio::test]
async fn test_create_admin_account() {
    let server = MockServer::start();
    let console = test_console(&server);
    mock_profile(&server, "admin-1", "admin@example.com", "admin");
    mock_pending_lookup(&server, "new@example.com", vec![]);

    server.mock(|when, then| {
        when.method(POST).path(format!("{AUTH}/accounts"));
        then.status(200).json_body(json!({ "localId": "new-admin", "email": "new@example.com" }));
    });
    let profile_write = server.mock(|when, then| {
        when.method(POST)
            .path(format!("{DOCS}/users"))
            .query_param("documentId", "new-admin");
        then.status(200).json_body(json!({ "name": format!("{DOC_NAMES}/users/new-admin") }));
    });
    server.mock(|when, then| {
        when.method(POST).path(format!("{AUTH}/accounts:sendOobCode"));
        then.status(200).json_body(json!({
            "email": "new@example.com",
            "oobLink": "https://example.com/reset?oobCode=abc"
        }));
    });

    let created = console
        .privileged()
        .create_admin_account("admin-1", create_request("new@example.com"))
        .await
        .unwrap();
    assert_eq!(created.id, "new-admin");
    assert_eq!(created.password_reset_link, "https://example.com/reset?oobCode=abc");
    profile_write.assert();
}

#[tokio::test]
async fn test_create_admin_account_removes_auth_account_when_profile_fails() {
    let server = MockServer::start();
    let console = test_console(&server);
    mock_profile(&server, "admin-1", "admin@example.com", "admin");
    mock_pending_lookup(&server, "new@example.com", vec![]);

    server.mock(|when, then| {
        when.method(POST).path(format!("{AUTH}/accounts"));
        then.status(200).json_body(json!({ "localId": "new-admin" }));
    });
    server.mock(|when, then| {
        when.method(POST).path(format!("{DOCS}/users"));
        then.status(500).json_body(json!({
            "error": { "code": 500, "message": "backend down", "status": "INTERNAL" }
        }));
    });
    let rollback = server.mock(|when, then| {
        when.method(POST)
            .path(format!("{AUTH}/accounts:delete"))
            .json_body(json!({ "localId": "new-admin" }));
        then.status(200).json_body(json!({}));
    });

    let err = console
        .privileged()
        .create_admin_account("admin-1", create_request("new@example.com"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), crate::error::ErrorKind::Internal);
    rollback.assert();
}

#[tokio::test]
async fn test_create_admin_account_validates_input() {
    let server = MockServer::start();
    let console = test_console(&server);
    mock_profile(&server, "admin-1", "admin@example.com", "admin");

    let mut request = create_request("new@example.com");
    request.password = "123".to_string();
    let err = console
        .privileged()
        .create_admin_account("admin-1", request)
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_reset_password_of_pending_admin_updates_hash() {
    let server = MockServer::start();
    let console = test_console(&server);
    mock_profile(&server, "admin-1", "admin@example.com", "admin");
    mock_auth_lookup(&server, "pending@example.com", None);

    let placeholder = json!({
        "email": "pending@example.com",
        "name": "Pending",
        "role": "admin",
        "isOnline": false,
        "createdAt": "2024-01-01T00:00:00Z",
        "pending": true,
        "pendingPasswordHash": "old"
    });
    mock_pending_lookup(&server, "pending@example.com", vec![document("users/pending-1", placeholder)]);

    let expected = pending_password_hash("pending@example.com", "fresh-pw");
    let update = server.mock(|when, then| {
        when.method(PATCH)
            .path(format!("{DOCS}/users/pending-1"))
            .json_body(json!({ "fields": { "pendingPasswordHash": { "stringValue": expected } } }));
        then.status(200).json_body(json!({}));
    });

    let reply = console
        .privileged()
        .reset_password(
            "admin-1",
            ResetPasswordRequest {
                email: "pending@example.com".to_string(),
                new_password: "fresh-pw".to_string(),
                caller_id: None,
            },
        )
        .await
        .unwrap();
    assert!(reply.ok);
    update.assert();
}

#[tokio::test]
async fn test_reset_password_of_auth_account() {
    let server = MockServer::start();
    let console = test_console(&server);
    mock_profile(&server, "admin-1", "admin@example.com", "admin");
    mock_auth_lookup(
        &server,
        "user@example.com",
        Some(json!({ "localId": "user-1", "email": "user@example.com" })),
    );
    let update = server.mock(|when, then| {
        when.method(POST)
            .path(format!("{AUTH}/accounts:update"))
            .json_body(json!({ "localId": "user-1", "password": "fresh-pw" }));
        then.status(200).json_body(json!({ "localId": "user-1" }));
    });

    console
        .privileged()
        .reset_password(
            "admin-1",
            ResetPasswordRequest {
                email: "user@example.com".to_string(),
                new_password: "fresh-pw".to_string(),
                caller_id: None,
            },
        )
        .await
        .unwrap();
    update.assert();
}

#[tokio::test]
async fn test_delete_account() {
    let server = MockServer::start();
    let console = test_console(&server);
    mock_profile(&server, "admin-1", "admin@example.com", "admin");

    let own = console
        .privileged()
        .delete_account(
            "admin-1",
            DeleteAccountRequest {
                email: "ADMIN@example.com".to_string(),
                caller_id: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(own, AdminError::PermissionDenied(_)));

    mock_auth_lookup(
        &server,
        "user@example.com",
        Some(json!({ "localId": "user-1", "email": "user@example.com" })),
    );
    mock_pending_lookup(&server, "user@example.com", vec![]);
    let auth_delete = server.mock(|when, then| {
        when.method(POST)
            .path(format!("{AUTH}/accounts:delete"))
            .json_body(json!({ "localId": "user-1" }));
        then.status(200).json_body(json!({}));
    });
    let profile_delete = server.mock(|when, then| {
        when.method(DELETE).path(format!("{DOCS}/users/user-1"));
        then.status(200).json_body(json!({}));
    });

    let reply = console
        .privileged()
        .delete_account(
            "admin-1",
            DeleteAccountRequest {
                email: "user@example.com".to_string(),
                caller_id: None,
            },
        )
        .await
        .unwrap();
    assert!(reply.ok);
    auth_delete.assert();
    profile_delete.assert();
}

#[tokio::test]
async fn test_delete_unknown_account_is_not_found() {
    let server = MockServer::start();
    let console = test_console(&server);
    mock_profile(&server, "admin-1", "admin@example.com", "admin");
    mock_auth_lookup(&server, "ghost@example.com", None);
    mock_pending_lookup(&server, "ghost@example.com", vec![]);

    let err = console
        .privileged()
        .delete_account(
            "admin-1",
            DeleteAccountRequest {
                email: "ghost@example.com".to_string(),
                caller_id: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::NotFound(_)));
    assert_eq!(err.kind().callable_status(), "NOT_FOUND");
}

#[tokio::test]
async fn test_get_user_info() {
    let server = MockServer::start();
    let console = test_console(&server);
    mock_profile(&server, "admin-1", "admin@example.com", "admin");
    mock_auth_lookup(
        &server,
        "user@example.com",
        Some(json!({ "localId": "user-1", "email": "user@example.com" })),
    );
    mock_profile(&server, "user-1", "user@example.com", "user");

    let info = console
        .privileged()
        .get_user_info(
            "admin-1",
            GetUserInfoRequest {
                email: "user@example.com".to_string(),
                caller_id: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(info.auth_record.unwrap().local_id, "user-1");
    assert_eq!(info.profile_record.unwrap().role, Role::User);
}

// --- datasets -----------------------------------------------------------

fn dataset(keyword: &str, token: &str) -> Value {
    json!({
        "keyword": keyword,
        "gifUrl": format!("https://cdn.example.com/{keyword}.gif?token={token}"),
        "storagePath": format!("gifs/{keyword}.gif"),
        "updatedAt": "2024-01-01T00:00:00Z"
    })
}

fn mock_dataset(server: &MockServer, keyword: &str) {
    let body = document(&format!("datasets/{keyword}"), dataset(keyword, "old-token"));
    server.mock(|when, then| {
        when.method(GET).path(format!("{DOCS}/datasets/{keyword}"));
        then.status(200).json_body(body);
    });
}

#[tokio::test]
async fn test_add_dataset_entry() {
    let server = MockServer::start();
    let console = test_console(&server);

    let upload = server.mock(|when, then| {
        when.method(POST)
            .path("/upload/storage/v1/b/test-bucket/o")
            .query_param("uploadType", "media")
            .query_param("name", "gifs/thank you.gif")
            .query_param("ifGenerationMatch", "0")
            .header("content-type", "image/gif");
        then.status(200).json_body(json!({ "name": "gifs/thank you.gif" }));
    });
    let token = server.mock(|when, then| {
        when.method(PATCH)
            .path("/storage/v1/b/test-bucket/o/gifs%2Fthank%20you.gif");
        then.status(200).json_body(json!({}));
    });
    let record = server.mock(|when, then| {
        when.method(POST)
            .path(format!("{DOCS}/datasets"))
            .query_param("documentId", "thank you");
        then.status(200).json_body(json!({ "name": format!("{DOC_NAMES}/datasets/thank you") }));
    });

    let entry = console.datasets().add("  Thank   You ", GIF).await.unwrap();
    assert_eq!(entry.keyword, "thank you");
    assert_eq!(entry.storage_path, "gifs/thank you.gif");
    assert!(entry.gif_url.starts_with(&server.url(
        "/v0/b/test-bucket/o/gifs%2Fthank%20you.gif?alt=media&token="
    )));

    upload.assert();
    token.assert();
    record.assert();
}

#[tokio::test]
async fn test_add_dataset_rejects_bad_input() {
    let server = MockServer::start();
    let console = test_console(&server);

    let err = console.datasets().add("hello", b"\x89PNG").await.unwrap_err();
    assert!(matches!(err, AdminError::InvalidArgument(_)));

    let err = console.datasets().add("a/b", GIF).await.unwrap_err();
    assert!(matches!(err, AdminError::InvalidArgument(_)));

    mock_dataset(&server, "hello");
    let err = console.datasets().add("Hello", GIF).await.unwrap_err();
    assert!(matches!(err, AdminError::AlreadyExists(_)));
}

#[tokio::test]
async fn test_add_dataset_keeps_blob_of_concurrent_entry() {
    let server = MockServer::start();
    let console = test_console(&server);

    server.mock(|when, then| {
        when.method(POST)
            .path("/upload/storage/v1/b/test-bucket/o")
            .query_param("ifGenerationMatch", "0");
        then.status(200).json_body(json!({ "name": "gifs/hello.gif" }));
    });
    server.mock(|when, then| {
        when.method(PATCH).path("/storage/v1/b/test-bucket/o/gifs%2Fhello.gif");
        then.status(200).json_body(json!({}));
    });
    server.mock(|when, then| {
        when.method(POST).path(format!("{DOCS}/datasets"));
        then.status(409).json_body(json!({
            "error": { "code": 409, "message": "Document already exists", "status": "ALREADY_EXISTS" }
        }));
    });
    let cleanup = server.mock(|when, then| {
        when.method(DELETE).path("/storage/v1/b/test-bucket/o/gifs%2Fhello.gif");
        then.status(204);
    });

    let err = console.datasets().add("hello", GIF).await.unwrap_err();
    assert!(matches!(err, AdminError::AlreadyExists(_)));
    cleanup.assert_calls(0);
}

#[tokio::test]
async fn test_add_dataset_does_not_overwrite_existing_blob() {
    let server = MockServer::start();
    let console = test_console(&server);

    let upload = server.mock(|when, then| {
        when.method(POST)
            .path("/upload/storage/v1/b/test-bucket/o")
            .query_param("ifGenerationMatch", "0");
        then.status(412).json_body(json!({
            "error": { "code": 412, "message": "At least one of the pre-conditions you specified did not hold." }
        }));
    });
    let token = server.mock(|when, then| {
        when.method(PATCH).path("/storage/v1/b/test-bucket/o/gifs%2Fhello.gif");
        then.status(200).json_body(json!({}));
    });
    let cleanup = server.mock(|when, then| {
        when.method(DELETE).path("/storage/v1/b/test-bucket/o/gifs%2Fhello.gif");
        then.status(204);
    });

    let err = console.datasets().add("hello", GIF).await.unwrap_err();
    assert!(matches!(err, AdminError::AlreadyExists(_)));
    upload.assert();
    token.assert_calls(0);
    cleanup.assert_calls(0);
}

#[tokio::test]
async fn test_add_dataset_removes_blob_when_record_fails() {
    let server = MockServer::start();
    let console = test_console(&server);

    server.mock(|when, then| {
        when.method(POST).path("/upload/storage/v1/b/test-bucket/o");
        then.status(200).json_body(json!({ "name": "gifs/hello.gif" }));
    });
    server.mock(|when, then| {
        when.method(PATCH).path("/storage/v1/b/test-bucket/o/gifs%2Fhello.gif");
        then.status(200).json_body(json!({}));
    });
    server.mock(|when, then| {
        when.method(POST).path(format!("{DOCS}/datasets"));
        then.status(500).json_body(json!({
            "error": { "code": 500, "message": "backend down", "status": "INTERNAL" }
        }));
    });
    let cleanup = server.mock(|when, then| {
        when.method(DELETE).path("/storage/v1/b/test-bucket/o/gifs%2Fhello.gif");
        then.status(204);
    });

    let err = console.datasets().add("hello", GIF).await.unwrap_err();
    assert_eq!(err.kind(), crate::error::ErrorKind::Internal);
    cleanup.assert();
}

#[tokio::test]
async fn test_list_and_search_datasets() {
    let server = MockServer::start();
    let console = test_console(&server);

    server.mock(|when, then| {
        when.method(GET).path(format!("{DOCS}/datasets"));
        then.status(200).json_body(json!({
            "documents": [
                document("datasets/thank you", dataset("thank you", "t1")),
                document("datasets/hello", dataset("hello", "t2")),
                document("datasets/goodbye", dataset("goodbye", "t3"))
            ]
        }));
    });

    let all = console.datasets().list().await.unwrap();
    let keywords: Vec<&str> = all.iter().map(|e| e.keyword.as_str()).collect();
    assert_eq!(keywords, vec!["goodbye", "hello", "thank you"]);

    let found = console.datasets().search("  O ").await.unwrap();
    let keywords: Vec<&str> = found.iter().map(|e| e.keyword.as_str()).collect();
    assert_eq!(keywords, vec!["goodbye", "hello", "thank you"]);

    let found = console.datasets().search("THANK").await.unwrap();
    assert_eq!(found.len(), 1);
}

#[tokio::test]
async fn test_get_missing_dataset_is_not_found() {
    let server = MockServer::start();
    let console = test_console(&server);

    let err = console.datasets().get("nothing").await.unwrap_err();
    assert!(matches!(err, AdminError::NotFound(_)));
}

#[tokio::test]
async fn test_replace_gif_issues_fresh_url() {
    let server = MockServer::start();
    let console = test_console(&server);
    mock_dataset(&server, "hello");

    let upload = server.mock(|when, then| {
        when.method(POST)
            .path("/upload/storage/v1/b/test-bucket/o")
            .query_param("name", "gifs/hello.gif");
        then.status(200).json_body(json!({ "name": "gifs/hello.gif" }));
    });
    server.mock(|when, then| {
        when.method(PATCH).path("/storage/v1/b/test-bucket/o/gifs%2Fhello.gif");
        then.status(200).json_body(json!({}));
    });
    let record = server.mock(|when, then| {
        when.method(PATCH)
            .path(format!("{DOCS}/datasets/hello"))
            .query_param("currentDocument.exists", "true");
        then.status(200).json_body(json!({}));
    });

    let entry = console.datasets().replace_gif("hello", GIF).await.unwrap();
    assert!(!entry.gif_url.contains("old-token"));
    assert!(entry.gif_url.contains("alt=media&token="));
    upload.assert();
    record.assert();
}

#[tokio::test]
async fn test_rename_dataset_entry() {
    let server = MockServer::start();
    let console = test_console(&server);
    mock_dataset(&server, "hello");

    let copy = server.mock(|when, then| {
        when.method(POST)
            .path("/storage/v1/b/test-bucket/o/gifs%2Fhello.gif/copyTo/b/test-bucket/o/gifs%2Fhi.gif");
        then.status(200).json_body(json!({
            "name": "gifs/hi.gif",
            "metadata": { "firebaseStorageDownloadTokens": "tok-1" }
        }));
    });
    let commit = server.mock(|when, then| {
        when.method(POST).path(format!("{DOCS}:commit"));
        then.status(200).json_body(json!({ "writeResults": [{}, {}] }));
    });
    let old_blob = server.mock(|when, then| {
        when.method(DELETE).path("/storage/v1/b/test-bucket/o/gifs%2Fhello.gif");
        then.status(204);
    });

    let renamed = console.datasets().rename("hello", "Hi").await.unwrap();
    assert_eq!(renamed.keyword, "hi");
    assert_eq!(
        renamed.gif_url,
        server.url("/v0/b/test-bucket/o/gifs%2Fhi.gif?alt=media&token=tok-1")
    );

    copy.assert();
    commit.assert();
    old_blob.assert();
}

#[tokio::test]
async fn test_rename_failure_removes_copied_blob() {
    let server = MockServer::start();
    let console = test_console(&server);
    mock_dataset(&server, "hello");

    server.mock(|when, then| {
        when.method(POST)
            .path("/storage/v1/b/test-bucket/o/gifs%2Fhello.gif/copyTo/b/test-bucket/o/gifs%2Fhi.gif");
        then.status(200).json_body(json!({
            "name": "gifs/hi.gif",
            "metadata": { "firebaseStorageDownloadTokens": "tok-1" }
        }));
    });
    server.mock(|when, then| {
        when.method(POST).path(format!("{DOCS}:commit"));
        then.status(409).json_body(json!({
            "error": { "code": 409, "message": "Document already exists", "status": "ALREADY_EXISTS" }
        }));
    });
    let copied_blob = server.mock(|when, then| {
        when.method(DELETE).path("/storage/v1/b/test-bucket/o/gifs%2Fhi.gif");
        then.status(204);
    });

    let err = console.datasets().rename("hello", "hi").await.unwrap_err();
    assert_eq!(err.kind(), crate::error::ErrorKind::AlreadyExists);
    copied_blob.assert();
}

#[tokio::test]
async fn test_rename_to_same_keyword_is_noop() {
    let server = MockServer::start();
    let console = test_console(&server);
    mock_dataset(&server, "hello");

    let entry = console.datasets().rename("hello", "  HELLO ").await.unwrap();
    assert_eq!(entry.keyword, "hello");
}

#[tokio::test]
async fn test_delete_dataset_tolerates_missing_blob() {
    let server = MockServer::start();
    let console = test_console(&server);
    mock_dataset(&server, "hello");

    let record = server.mock(|when, then| {
        when.method(DELETE).path(format!("{DOCS}/datasets/hello"));
        then.status(200).json_body(json!({}));
    });
    server.mock(|when, then| {
        when.method(DELETE).path("/storage/v1/b/test-bucket/o/gifs%2Fhello.gif");
        then.status(404).body("No such object");
    });

    console.datasets().delete("hello").await.unwrap();
    record.assert();
}

// --- feedback -----------------------------------------------------------

#[tokio::test]
async fn test_feedback_list_resolves_authors() {
    let server = MockServer::start();
    let console = test_console(&server);

    server.mock(|when, then| {
        when.method(POST).path(format!("{DOCS}:runQuery")).json_body(json!({
            "structuredQuery": {
                "from": [{ "collectionId": "feedback" }],
                "orderBy": [{ "field": { "fieldPath": "timestamp" }, "direction": "DESCENDING" }],
                "limit": 10
            }
        }));
        then.status(200).json_body(query_results(vec![
            document(
                "feedback/f2",
                json!({ "userId": "user-1", "message": "More signs please", "timestamp": "2024-03-09T10:00:00Z" }),
            ),
            document(
                "feedback/f1",
                json!({ "userId": "gone", "message": "Great app", "timestamp": "2024-03-08T10:00:00Z" }),
            ),
        ]));
    });
    mock_profile(&server, "user-1", "user@example.com", "user");

    let feedback = console.feedback().list(10).await.unwrap();
    assert_eq!(feedback.len(), 2);
    assert_eq!(feedback[0].id, "f2");
    assert_eq!(feedback[0].author_email.as_deref(), Some("user@example.com"));
    assert_eq!(feedback[1].author_email, None);
}

#[tokio::test]
async fn test_feedback_for_user_newest_first() {
    let server = MockServer::start();
    let console = test_console(&server);

    server.mock(|when, then| {
        when.method(POST).path(format!("{DOCS}:runQuery")).json_body(json!({
            "structuredQuery": {
                "from": [{ "collectionId": "feedback" }],
                "where": equal("userId", json!({ "stringValue": "user-1" }))
            }
        }));
        then.status(200).json_body(query_results(vec![
            document(
                "feedback/old",
                json!({ "userId": "user-1", "message": "First", "timestamp": "2024-03-01T10:00:00Z" }),
            ),
            document(
                "feedback/new",
                json!({ "userId": "user-1", "message": "Second", "timestamp": "2024-03-05T10:00:00Z" }),
            ),
        ]));
    });
    mock_profile(&server, "user-1", "user@example.com", "user");

    let feedback = console.feedback().list_for_user("user-1").await.unwrap();
    let ids: Vec<&str> = feedback.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, vec!["new", "old"]);
    assert_eq!(feedback[0].author_name.as_deref(), Some("Test User"));
}

#[tokio::test]
async fn test_delete_missing_feedback_is_not_found() {
    let server = MockServer::start();
    let console = test_console(&server);

    let err = console.feedback().delete("nope").await.unwrap_err();
    assert!(matches!(err, AdminError::NotFound(_)));
}

// --- reports ------------------------------------------------------------

#[tokio::test]
async fn test_report_summary() {
    let server = MockServer::start();
    let console = test_console(&server);

    let mut online_admin = profile("admin@example.com", "admin");
    online_admin["isOnline"] = json!(true);
    online_admin["createdAt"] = json!("2024-03-09T08:00:00Z");
    let mut placeholder = profile("pending@example.com", "admin");
    placeholder["pending"] = json!(true);
    placeholder["pendingPasswordHash"] = json!("abc");

    server.mock(|when, then| {
        when.method(GET).path(format!("{DOCS}/users"));
        then.status(200).json_body(json!({
            "documents": [
                document("users/admin-1", online_admin),
                document("users/user-1", profile("user@example.com", "user")),
                document("users/p1", placeholder)
            ]
        }));
    });
    server.mock(|when, then| {
        when.method(GET).path(format!("{DOCS}/datasets"));
        then.status(200).json_body(json!({
            "documents": [
                document("datasets/hello", dataset("hello", "t1")),
                document("datasets/hi", dataset("hi", "t2"))
            ]
        }));
    });
    server.mock(|when, then| {
        when.method(GET).path(format!("{DOCS}/feedback"));
        then.status(200).json_body(json!({
            "documents": [
                document("feedback/a", json!({ "userId": "user-1", "message": "a", "timestamp": "2024-03-10T09:00:00Z" })),
                document("feedback/b", json!({ "userId": "user-1", "message": "b", "timestamp": "2024-03-08T09:00:00Z" })),
                document("feedback/c", json!({ "userId": "user-1", "message": "c", "timestamp": "2024-03-10T11:00:00Z" })),
                document("feedback/d", json!({ "userId": "user-1", "message": "d", "timestamp": "2024-01-01T00:00:00Z" }))
            ]
        }));
    });

    let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
    let report = console.reports().summary_at(now, 3).await.unwrap();

    assert_eq!(report.total_users, 2);
    assert_eq!(report.admins, 1);
    assert_eq!(report.pending_admins, 1);
    assert_eq!(report.online_users, 1);
    assert_eq!(report.new_users, 1);
    assert_eq!(report.dataset_entries, 2);
    assert_eq!(report.total_feedback, 4);
    assert_eq!(report.recent_feedback, 3);

    let days: Vec<(NaiveDate, usize)> = report.feedback_by_day.iter().map(|d| (d.date, d.count)).collect();
    let day = |d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap();
    assert_eq!(days, vec![(day(8), 1), (day(9), 0), (day(10), 2)]);
}

#[tokio::test]
async fn test_report_window_must_be_positive() {
    let server = MockServer::start();
    let console = test_console(&server);

    let err = console.reports().summary(0).await.unwrap_err();
    assert!(matches!(err, AdminError::InvalidArgument(_)));
}

// --- maintenance --------------------------------------------------------

#[tokio::test]
async fn test_maintenance_defaults_to_disabled() {
    let server = MockServer::start();
    let console = test_console(&server);

    let status = console.maintenance().status().await.unwrap();
    assert!(!status.enabled);
    assert_eq!(status.message, None);
}

#[tokio::test]
async fn test_set_maintenance() {
    let server = MockServer::start();
    let console = test_console(&server);

    let write = server.mock(|when, then| {
        when.method(PATCH).path(format!("{DOCS}/settings/maintenance"));
        then.status(200).json_body(json!({}));
    });

    let settings = console
        .maintenance()
        .set("admin-1", true, Some("  Back soon  "))
        .await
        .unwrap();
    assert!(settings.enabled);
    assert_eq!(settings.message.as_deref(), Some("Back soon"));
    assert_eq!(settings.updated_by.as_deref(), Some("admin-1"));
    write.assert();

    let settings = console.maintenance().set("admin-1", false, Some("   ")).await.unwrap();
    assert_eq!(settings.message, None);
}
