//! Full client lifecycle against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, writes a mapping document to a
//! temporary file, then drives every operation through `ApiClient` over real
//! HTTP with the ureq transport. The server verifies each `APIAuth`
//! signature with its own implementation, so a signing regression shows up
//! here as a 401.

use std::net::SocketAddr;
use std::path::PathBuf;

use apimap_core::{ApiClient, ApiError, CallArgs, ClientConfig, ConfigError, TransportError};
use mock_server::Credentials;
use serde_json::Value;

const MAPPING: &str = r#"{
    "settings": {
        "defaultEmail": "nobody@example.com"
    },
    "mappings": {
        "users": {"Path": "users", "Request Type": "GET"},
        "getUser": {"Path": "users/[id]", "Request Type": "GET"},
        "createUser": {
            "Path": "users",
            "Request Type": "POST",
            "Data Structure": {"attributes": {"name": null, "email": "<defaultEmail>"}}
        },
        "updateUser": {
            "Path": "users/[id]",
            "Request Type": "PATCH",
            "Data Structure": {"attributes": {"name": null, "email": null}}
        },
        "deleteUser": {"Path": "users/[id]", "Request Type": "DELETE"}
    }
}"#;

fn secret_key() -> String {
    format!("{}{}", "s".repeat(60), "S3cr3t+/".repeat(4))
}

fn public_key() -> String {
    format!("{}{}", "p".repeat(60), "Publ1c+/".repeat(4))
}

/// Start the mock server on a random port and return its address.
fn spawn_server(credentials: Credentials) -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener, credentials).await
        })
        .unwrap();
    });

    addr
}

/// Write the mapping document to a uniquely named temporary file.
fn mapping_file() -> PathBuf {
    let path = std::env::temp_dir().join(format!("apimap-{}.json", uuid::Uuid::new_v4()));
    std::fs::write(&path, MAPPING).unwrap();
    path
}

fn config(addr: SocketAddr, mapping: PathBuf) -> ClientConfig {
    ClientConfig::new(secret_key(), public_key())
        .with_mapping_path(mapping)
        .with_base_url(format!("http://{addr}"))
        .with_verbose(true)
}

fn data(body: &str) -> Value {
    let doc: Value = serde_json::from_str(body).unwrap();
    doc["data"].clone()
}

#[test]
fn client_lifecycle() {
    // Step 1: start mock server and build the client (runs the probe).
    let addr = spawn_server(Credentials::new(public_key(), secret_key()));
    let mapping = mapping_file();
    let client = ApiClient::new(config(addr, mapping.clone())).unwrap();
    std::fs::remove_file(&mapping).unwrap();

    // Step 2: list, should be empty.
    let users = data(&client.call("users", &CallArgs::new()).unwrap());
    assert_eq!(users, Value::Array(Vec::new()));

    // Step 3: create; email comes from the settings default.
    let created = data(&client.call("createUser", &CallArgs::new().arg("name", "Ann")).unwrap());
    assert_eq!(created["attributes"]["name"], "Ann");
    assert_eq!(created["attributes"]["email"], "nobody@example.com");
    let id = created["id"].as_str().unwrap().to_string();

    // Step 4: get by id.
    let fetched = data(&client.call("getUser", &CallArgs::new().arg("id", id.as_str())).unwrap());
    assert_eq!(fetched, created);

    // Step 5: update the name; `id` binds to the path, email stays.
    let updated = data(
        &client
            .call("updateUser", &CallArgs::new().arg("id", id.as_str()).arg("name", "Ann B"))
            .unwrap(),
    );
    assert_eq!(updated["attributes"]["name"], "Ann B");
    assert_eq!(updated["attributes"]["email"], "nobody@example.com");

    // Step 6: list, one user.
    let users = data(&client.call("users", &CallArgs::new()).unwrap());
    assert_eq!(users.as_array().unwrap().len(), 1);

    // Step 7: delete returns an empty body.
    let body = client.call("deleteUser", &CallArgs::new().arg("id", id.as_str())).unwrap();
    assert!(body.is_empty());

    // Step 8: get after delete, the 404 is a transport error.
    let err = client.call("getUser", &CallArgs::new().arg("id", id.as_str())).unwrap_err();
    assert!(matches!(err, ApiError::Transport(TransportError::Status { status: 404, .. })));

    // Step 9: unknown operation and unbound argument never reach the server.
    let err = client.call("listTeams", &CallArgs::new()).unwrap_err();
    assert!(matches!(err, ApiError::UnknownOperation { .. }));
    let err = client.call("users", &CallArgs::new().arg("page", 2)).unwrap_err();
    assert!(matches!(err, ApiError::UnboundArgument { .. }));
}

#[test]
fn wrong_credentials_fail_the_connectivity_probe() {
    let addr = spawn_server(Credentials::new(public_key(), "a-different-secret"));
    let mapping = mapping_file();
    let result = ApiClient::new(config(addr, mapping.clone()));
    std::fs::remove_file(&mapping).unwrap();

    assert!(matches!(
        result,
        Err(ApiError::Config(ConfigError::ConnectivityCheckFailed))
    ));
}

#[test]
fn unreachable_service_fails_verification() {
    // Bind and drop to get a port nobody listens on.
    let addr = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
    let mapping = mapping_file();
    let result = ApiClient::new(config(addr, mapping.clone()));
    std::fs::remove_file(&mapping).unwrap();

    assert!(matches!(
        result,
        Err(ApiError::Config(ConfigError::ConnectivityCheckFailed))
    ));
}
