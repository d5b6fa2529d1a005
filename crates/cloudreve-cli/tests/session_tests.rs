//! CLI commands against a mocked Cloudreve server
//!
//! Run with: cargo test --package cloudreve-cli --test session_tests

use cloudreve_cli::{Command, Session, Settings};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ok(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "code": 0, "data": data, "msg": "" }))
}

fn settings_for(server: &MockServer, download_dir: &std::path::Path) -> Settings {
    let mut settings = Settings {
        address: server.uri(),
        path: vec![download_dir.to_path_buf()],
        ..Default::default()
    };
    settings.login.user = "admin@cloudreve.org".to_string();
    settings.login.password = "password".to_string();
    settings
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v3/user/session"))
        .and(body_partial_json(json!({ "userName": "admin@cloudreve.org" })))
        .respond_with(ok(json!({ "id": "lpua", "user_name": "admin@cloudreve.org", "nickname": "admin" })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_listing(server: &MockServer, dir: &str, policy_kind: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/api/v3/directory{}", dir)))
        .respond_with(ok(json!({
            "parent": "root",
            "objects": [
                {"id": "f1", "name": "a.txt", "path": dir, "size": 3, "type": "file",
                 "date": "2023-05-02T10:00:00Z", "create_date": "2023-05-02T10:00:00Z"},
                {"id": "d1", "name": "sub", "path": dir, "size": 0, "type": "dir",
                 "date": "2023-05-02T10:00:00Z", "create_date": "2023-05-02T10:00:00Z"}
            ],
            "policy": {"id": "p1", "name": "Default", "type": policy_kind}
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_get_uses_configured_download_dir() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_listing(&server, "/docs", "local").await;

    Mock::given(method("PUT"))
        .and(path("/api/v3/file/download/f1"))
        .respond_with(ok(json!("/api/v3/file/get/f1/a.txt")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/file/get/f1/a.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"abc".to_vec()))
        .mount(&server)
        .await;

    let downloads = tempfile::tempdir().unwrap();
    let session = Session::connect(&settings_for(&server, downloads.path())).await.unwrap();
    assert_eq!(session.user.id, "lpua");

    session
        .run(&Command::Get { remote: "/docs/a.txt".to_string(), dst: None })
        .await
        .unwrap();

    assert_eq!(std::fs::read(downloads.path().join("a.txt")).unwrap(), b"abc");
}

#[tokio::test]
async fn test_get_directory_is_refused() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_listing(&server, "/docs", "local").await;

    let downloads = tempfile::tempdir().unwrap();
    let session = Session::connect(&settings_for(&server, downloads.path())).await.unwrap();

    let err = session
        .run(&Command::Get { remote: "/docs/sub".to_string(), dst: None })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("is a directory"));
}

#[tokio::test]
async fn test_put_uses_directory_policy() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_listing(&server, "/docs", "local").await;

    Mock::given(method("PUT"))
        .and(path("/api/v3/file/upload"))
        .and(body_partial_json(json!({ "name": "up.txt", "path": "/docs", "policy_id": "p1", "size": 5 })))
        .respond_with(ok(json!({ "sessionID": "s1", "chunkSize": 0 })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v3/file/upload/s1/0"))
        .respond_with(ok(Value::Null))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("up.txt");
    std::fs::write(&src, b"hello").unwrap();

    let session = Session::connect(&settings_for(&server, dir.path())).await.unwrap();
    session
        .run(&Command::Put { src, remote_dir: "/docs".to_string() })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_move_selects_files_and_dirs() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_listing(&server, "/docs", "local").await;

    Mock::given(method("PATCH"))
        .and(path("/api/v3/object"))
        .and(body_partial_json(json!({
            "action": "move", "src_dir": "/docs", "dst": "/archive",
            "src": {"dirs": ["d1"], "items": ["f1"]}
        })))
        .respond_with(ok(Value::Null))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let session = Session::connect(&settings_for(&server, dir.path())).await.unwrap();
    session
        .run(&Command::Mv {
            sources: vec!["/docs/a.txt".to_string(), "/docs/sub".to_string()],
            dst: "/archive".to_string(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_move_from_directory_with_reserved_characters() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    // Only the encoded listing exists; a truncated `/directory/C` would 404
    mount_listing(&server, "/C%23%20notes", "local").await;

    Mock::given(method("PATCH"))
        .and(path("/api/v3/object"))
        .and(body_partial_json(json!({
            "action": "move", "src_dir": "/C# notes", "dst": "/archive",
            "src": {"dirs": [], "items": ["f1"]}
        })))
        .respond_with(ok(Value::Null))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let session = Session::connect(&settings_for(&server, dir.path())).await.unwrap();
    session
        .run(&Command::Mv {
            sources: vec!["/C# notes/a.txt".to_string()],
            dst: "/archive".to_string(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_copy_rejects_mixed_parents() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let session = Session::connect(&settings_for(&server, dir.path())).await.unwrap();
    let err = session
        .run(&Command::Cp {
            sources: vec!["/docs/a.txt".to_string(), "/other/b.txt".to_string()],
            dst: "/archive".to_string(),
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("same directory"));
}

#[tokio::test]
async fn test_stale_session_detection() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let settings = settings_for(&server, dir.path());
    let mut session = Session::connect(&settings).await.unwrap();

    let mut moved = settings.clone();
    moved.path = vec![dir.path().join("elsewhere")];
    assert!(!session.is_stale(&moved));
    session.refresh(moved);
    assert_eq!(session.settings().download_dir(), dir.path().join("elsewhere"));

    let mut other_account = settings.clone();
    other_account.login.user = "guest@cloudreve.org".to_string();
    assert!(session.is_stale(&other_account));
}
