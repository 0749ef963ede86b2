//! End-to-end command tests against a mock Graph server.

use clap::Parser;
use graphbulk_cli::{commands, Cli, CliError};
use serde_json::{json, Value};
use std::path::Path;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const TENANT: &str = "cli-tenant";

async fn mock_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!("/{}/oauth2/v2.0/token", TENANT)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "cli-token",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .mount(server)
        .await;
}

/// Answers `$batch` with one sub-response per sub-request.
async fn mock_batch<F>(server: &MockServer, script: F)
where
    F: Fn(&str, &Value) -> Value + Send + Sync + 'static,
{
    Mock::given(method("POST"))
        .and(path("/v1.0/$batch"))
        .and(header("authorization", "Bearer cli-token"))
        .respond_with(move |request: &Request| {
            let body: Value = serde_json::from_slice(&request.body).unwrap_or_default();
            let responses: Vec<Value> = body["requests"]
                .as_array()
                .map(|requests| {
                    requests
                        .iter()
                        .map(|r| {
                            let user = r["url"]
                                .as_str()
                                .and_then(|u| u.trim_start_matches('/').split('/').nth(1))
                                .unwrap_or_default();
                            script(user, &r["id"])
                        })
                        .collect()
                })
                .unwrap_or_default();
            ResponseTemplate::new(200).set_body_json(json!({ "responses": responses }))
        })
        .mount(server)
        .await;
}

fn cli(server: &MockServer, args: &[&str]) -> Cli {
    let uri = server.uri();
    let mut argv = vec![
        "graphbulk",
        "--client-id",
        "cli-app",
        "--client-secret",
        "cli-secret",
        "--tenant-id",
        TENANT,
        "--login-endpoint",
        &uri,
        "--graph-endpoint",
        &uri,
    ];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).expect("valid command line")
}

fn write_users(path: &Path, count: usize) {
    let users: Vec<Value> = (0..count)
        .map(|i| json!({ "id": format!("user-{}", i), "displayName": format!("User {}", i) }))
        .collect();
    std::fs::write(path, serde_json::to_string(&users).unwrap()).unwrap();
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn user_number(user: &str) -> usize {
    user.trim_start_matches("user-").parse().unwrap_or(0)
}

#[tokio::test]
async fn test_get_users_writes_every_user() {
    let server = MockServer::start().await;
    mock_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{ "id": "user-0" }, { "id": "user-1" }]
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("users.json");
    let output_arg = output.to_string_lossy().to_string();

    commands::run(cli(&server, &["get", "users", &output_arg]))
        .await
        .unwrap();

    assert_eq!(
        read_json(&output),
        json!([{ "id": "user-0" }, { "id": "user-1" }])
    );
}

#[tokio::test]
async fn test_get_resource_end_to_end() {
    let server = MockServer::start().await;
    mock_token(&server).await;
    mock_batch(&server, |user, id| {
        if user_number(user) % 2 == 0 {
            json!({
                "id": id,
                "status": 200,
                "body": { "value": [{ "id": format!("{}-pwd", user) }] }
            })
        } else {
            json!({ "id": id, "status": 404, "body": {} })
        }
    })
    .await;

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("users.json");
    let output = dir.path().join("methods.json");
    write_users(&input, 45);
    let (input_arg, output_arg) = (
        input.to_string_lossy().to_string(),
        output.to_string_lossy().to_string(),
    );

    commands::run(cli(
        &server,
        &[
            "get",
            "resource",
            "authenticate",
            &input_arg,
            &output_arg,
            "--workers",
            "3",
            "--no-progress",
        ],
    ))
    .await
    .unwrap();

    let written = read_json(&output);
    let map = written.as_object().unwrap();
    assert_eq!(map.len(), 23);
    assert_eq!(map["user-44"], json!([{ "id": "user-44-pwd" }]));
    assert!(!map.contains_key("user-1"));
}

#[tokio::test]
async fn test_get_resource_abort_writes_partial_results() {
    let server = MockServer::start().await;
    mock_token(&server).await;
    mock_batch(&server, |user, id| {
        if user == "user-3" {
            json!({
                "id": id,
                "status": 403,
                "body": { "error": { "code": "Authorization_RequestDenied", "message": "Insufficient privileges" } }
            })
        } else {
            json!({ "id": id, "status": 200, "body": { "value": [{ "id": "m" }] } })
        }
    })
    .await;

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("users.json");
    let output = dir.path().join("methods.json");
    write_users(&input, 5);
    let (input_arg, output_arg) = (
        input.to_string_lossy().to_string(),
        output.to_string_lossy().to_string(),
    );

    let err = commands::run(cli(
        &server,
        &[
            "get",
            "resource",
            "authentication/methods",
            &input_arg,
            &output_arg,
            "--workers",
            "1",
            "--no-progress",
        ],
    ))
    .await
    .unwrap_err();

    assert!(matches!(err, CliError::Partial { completed: 4, total: 5, .. }));
    assert_eq!(err.exit_code(), 5);

    let written = read_json(&output);
    let map = written.as_object().unwrap();
    assert_eq!(map.len(), 4);
    assert!(!map.contains_key("user-3"));
}

#[tokio::test]
async fn test_continue_on_error_records_failure() {
    let server = MockServer::start().await;
    mock_token(&server).await;
    mock_batch(&server, |user, id| {
        let status = if user == "user-3" { 500 } else { 200 };
        json!({ "id": id, "status": status, "body": { "value": [] } })
    })
    .await;

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("users.json");
    let output = dir.path().join("methods.json");
    write_users(&input, 5);
    let (input_arg, output_arg) = (
        input.to_string_lossy().to_string(),
        output.to_string_lossy().to_string(),
    );

    commands::run(cli(
        &server,
        &[
            "get",
            "resource",
            "authenticate",
            &input_arg,
            &output_arg,
            "--continue-on-error",
            "--no-progress",
        ],
    ))
    .await
    .unwrap();

    let written = read_json(&output);
    assert_eq!(written.as_object().unwrap().len(), 4);
}

#[tokio::test]
async fn test_rejected_credentials_stop_before_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/{}/oauth2/v2.0/token", TENANT)))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "Invalid client secret provided."
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1.0/$batch"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("users.json");
    let output = dir.path().join("methods.json");
    write_users(&input, 3);
    let (input_arg, output_arg) = (
        input.to_string_lossy().to_string(),
        output.to_string_lossy().to_string(),
    );

    let err = commands::run(cli(
        &server,
        &["get", "resource", "authenticate", &input_arg, &output_arg, "--no-progress"],
    ))
    .await
    .unwrap_err();

    assert_eq!(err.exit_code(), 2);
    assert!(!output.exists());
}

#[tokio::test]
async fn test_unknown_resource_is_validation_error() {
    let server = MockServer::start().await;

    let err = commands::run(cli(
        &server,
        &["get", "resource", "mailFolders", "in.json", "out.json"],
    ))
    .await
    .unwrap_err();

    assert!(matches!(err, CliError::Validation(_)));
    assert_eq!(err.exit_code(), 4);
}

#[tokio::test]
async fn test_auth_command() {
    let server = MockServer::start().await;
    mock_token(&server).await;

    commands::run(cli(&server, &["auth"])).await.unwrap();
}
