//! Client tests against a local mock of the TNG API.

use serde_json::json;
use tngfetch_api::{ApiError, Client};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap()
}

/// Matches requests that carry no `api-key` header at all.
struct NoApiKey;

impl Match for NoApiKey {
    fn matches(&self, request: &Request) -> bool {
        !request.headers.contains_key("api-key")
    }
}

fn mount(rt: &tokio::runtime::Runtime, server: &MockServer, mock: Mock) {
    rt.block_on(mock.mount(server));
}

#[test]
fn resolve_sends_key_and_returns_attributes() {
    let rt = runtime();
    let server = rt.block_on(MockServer::start());
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path("/TNG50-1/snapshots/99/"))
            .and(header("api-key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "number": 99,
                "redshift": 0.0,
                "num_groups_subfind": 2500,
            }))),
    );

    let client = Client::new(server.uri(), "secret");
    let snap = client.resolve("TNG50-1", 99).unwrap();
    assert_eq!(snap.subhalo_count(), Some(2500));
    assert_eq!(snap.api_url, format!("{}/TNG50-1/snapshots/99/", server.uri()));
}

#[test]
fn resolve_unknown_snapshot_is_not_found() {
    let rt = runtime();
    let server = rt.block_on(MockServer::start());
    mount(
        &rt,
        &server,
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(404)),
    );

    let client = Client::new(server.uri(), "secret");
    let err = client.resolve("TNG50-1", 1000).unwrap_err();
    assert!(matches!(err, ApiError::NotFound { .. }), "got {err:?}");
    assert!(err.is_fatal());
}

#[test]
fn resolve_non_object_is_decode_error() {
    let rt = runtime();
    let server = rt.block_on(MockServer::start());
    mount(
        &rt,
        &server,
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(200).set_body_json(json!([1, 2]))),
    );

    let err = Client::new(server.uri(), "k").resolve("TNG50-1", 99).unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)), "got {err:?}");
}

#[test]
fn empty_key_sends_no_header_and_maps_403_to_auth() {
    let rt = runtime();
    let server = rt.block_on(MockServer::start());
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(NoApiKey)
            .respond_with(ResponseTemplate::new(403)),
    );

    let client = Client::new(server.uri(), "");
    let url = format!("{}/TNG50-1/snapshots/99/subhalos/?limit=10&offset=0", server.uri());
    let err = client.fetch_page(&url).unwrap_err();
    assert!(matches!(err, ApiError::Auth { status: 403 }), "got {err:?}");
}

#[test]
fn fetch_page_parses_results() {
    let rt = runtime();
    let server = rt.block_on(MockServer::start());
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path("/TNG50-1/snapshots/99/subhalos/"))
            .and(query_param("limit", "2"))
            .and(query_param("offset", "4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 6,
                "next": null,
                "results": [
                    {"id": 4, "sfr": 0.1, "mass_log_msun": 10.2, "url": "u4"},
                    {"id": 5, "sfr": 0.0, "mass_log_msun": 11.0, "url": "u5"},
                ],
            }))),
    );

    let client = Client::new(server.uri(), "k");
    let url = format!("{}/TNG50-1/snapshots/99/subhalos/?limit=2&offset=4", server.uri());
    let page = client.fetch_page(&url).unwrap();
    assert_eq!(page.results.len(), 2);
    assert_eq!(page.results[1]["id"], 5);
}

#[test]
fn fetch_page_server_error_is_transient() {
    let rt = runtime();
    let server = rt.block_on(MockServer::start());
    mount(
        &rt,
        &server,
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(503)),
    );

    let err = Client::new(server.uri(), "k")
        .fetch_page(&format!("{}/x/", server.uri()))
        .unwrap_err();
    assert!(matches!(err, ApiError::Transient { status: Some(503), .. }));
}

#[test]
fn connection_refused_is_transient() {
    // nothing listens on port 9 of localhost in CI
    let client = Client::new("http://127.0.0.1:9", "k");
    let err = client.fetch_page("http://127.0.0.1:9/x/").unwrap_err();
    assert!(matches!(err, ApiError::Transient { status: None, .. }), "got {err:?}");
}

#[test]
fn download_cutout_writes_file_named_by_server() {
    let rt = runtime();
    let server = rt.block_on(MockServer::start());
    let cutout_url = format!("{}/TNG50-1/snapshots/99/subhalos/7/cutout.hdf5", server.uri());
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path("/TNG50-1/snapshots/99/subhalos/7/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 7,
                "cutouts": {"subhalo": cutout_url, "parent_halo": "unused"},
            }))),
    );
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path("/TNG50-1/snapshots/99/subhalos/7/cutout.hdf5"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-disposition", "attachment; filename=cutout_7.hdf5")
                    .set_body_bytes(b"HDF5DATA".to_vec()),
            ),
    );

    let dir = tempfile::tempdir().unwrap();
    let client = Client::new(server.uri(), "k");
    let saved = client
        .download_cutout("TNG50-1", 99, 7, dir.path(), false)
        .unwrap();
    assert_eq!(saved, dir.path().join("cutout_7.hdf5"));
    assert_eq!(std::fs::read(&saved).unwrap(), b"HDF5DATA");
}

#[test]
fn download_cutout_without_link_is_decode_error() {
    let rt = runtime();
    let server = rt.block_on(MockServer::start());
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7}))),
    );

    let dir = tempfile::tempdir().unwrap();
    let err = Client::new(server.uri(), "k")
        .download_cutout("TNG50-1", 99, 7, dir.path(), true)
        .unwrap_err();
    assert!(matches!(err, ApiError::Decode(ref m) if m.contains("parent_halo")));
}

#[test]
fn download_into_missing_directory_uses_server_name() {
    let rt = runtime();
    let server = rt.block_on(MockServer::start());
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path("/files/cutout.hdf5"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-disposition", "attachment; filename=cutout_7.hdf5")
                    .set_body_bytes(b"HDF5DATA".to_vec()),
            ),
    );

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("cutouts/");
    assert!(!dest.exists());
    let saved = Client::new(server.uri(), "k")
        .download(&format!("{}/files/cutout.hdf5", server.uri()), &dest)
        .unwrap();
    assert_eq!(saved, dir.path().join("cutouts").join("cutout_7.hdf5"));
    assert_eq!(std::fs::read(&saved).unwrap(), b"HDF5DATA");
}

#[test]
fn download_to_missing_file_path_keeps_given_name() {
    let rt = runtime();
    let server = rt.block_on(MockServer::start());
    mount(
        &rt,
        &server,
        Mock::given(method("GET")).respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-disposition", "attachment; filename=cutout_7.hdf5")
                .set_body_bytes(b"HDF5DATA".to_vec()),
        ),
    );

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("out").join("mine.hdf5");
    let saved = Client::new(server.uri(), "k")
        .download(&format!("{}/files/cutout.hdf5", server.uri()), &dest)
        .unwrap();
    assert_eq!(saved, dest);
    assert_eq!(std::fs::read(&saved).unwrap(), b"HDF5DATA");
}

/// Serves one response whose body stops well short of its `content-length`.
fn truncated_server() -> String {
    use std::io::{Read, Write};

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = [0u8; 4096];
        let _ = stream.read(&mut buf);
        let _ = stream.write_all(
            b"HTTP/1.1 200 OK\r\n\
              content-length: 1000\r\n\
              content-disposition: attachment; filename=partial.hdf5\r\n\
              connection: close\r\n\r\n\
              HDF5",
        );
        let _ = stream.flush();
    });
    format!("http://{addr}")
}

#[test]
fn interrupted_download_removes_partial_file() {
    let base = truncated_server();
    let dir = tempfile::tempdir().unwrap();

    let err = Client::new(&base, "k")
        .download(&format!("{base}/cutout.hdf5"), dir.path())
        .unwrap_err();
    assert!(!matches!(err, ApiError::NotFound { .. }), "{err:?}");
    assert!(!dir.path().join("partial.hdf5").exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn simulation_returns_metadata() {
    let rt = runtime();
    let server = rt.block_on(MockServer::start());
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path("/TNG50-1/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "TNG50-1",
                "num_snapshots": 100,
                "boxsize": 35000.0,
            }))),
    );

    let meta = Client::new(server.uri(), "k").simulation("TNG50-1").unwrap();
    assert_eq!(meta["num_snapshots"], 100);
}
