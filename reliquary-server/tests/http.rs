// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! End-to-end tests over the assembled router. */

use axum::{
    body::{Body, Bytes},
    http::{header, Request, StatusCode},
    routing::get,
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use http_body_util::BodyExt;
use reliquary::{
    control::ControlParagraph,
    deb::builder::DebBuilder,
    reindex::reindex,
    settings::{DatabaseSettings, ReliquarySettings, Settings},
    store::Store,
};
use reliquary_server::{server::router, state::AppState, state::SharedState};
use std::path::Path;
use tower::util::ServiceExt;

fn settings_for(root: &Path) -> Settings {
    Settings {
        reliquary: ReliquarySettings {
            location: Some(root.to_path_buf()),
            auth: "alice:secret:admin".to_string(),
            ..Default::default()
        },
        database: DatabaseSettings {
            url: "sqlite::memory:".to_string(),
        },
    }
}

async fn test_state(root: &Path) -> SharedState {
    let store = Store::in_memory().await.expect("store should open");
    AppState::new(store, settings_for(root))
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    String::from_utf8_lossy(&bytes).to_string()
}

fn basic_auth(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", user, password)))
}

#[tokio::test]
async fn put_requires_authentication() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(test_state(dir.path()).await);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/v1/raw/alpha/stable/test.tgz")
                .body(Body::from("payload"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let challenge = response
        .headers()
        .get(header::WWW_AUTHENTICATE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(challenge.contains("realm=\"reliquary\""));

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/v1/raw/alpha/stable/test.tgz")
                .header(header::AUTHORIZATION, basic_auth("alice", "secret"))
                .body(Body::from("payload"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, r#"{"status":"ok"}"#);

    let stored = std::fs::read(dir.path().join("alpha/stable/test.tgz")).unwrap();
    assert_eq!(stored, b"payload");
}

#[tokio::test]
async fn put_rejects_path_escape() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(test_state(dir.path()).await);

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/v1/raw/alpha%2F..%2F../stable/evil.tgz")
                .header(header::AUTHORIZATION, basic_auth("alice", "secret"))
                .body(Body::from("payload"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_string(response).await,
        r#"{"status":"error","invalid channel/index"}"#
    );

    // Nothing was written anywhere under (or above) the root.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn get_streams_stored_relic() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("alpha/stable")).unwrap();
    std::fs::write(
        dir.path().join("alpha/stable/left-pad-1.3.0.tgz"),
        b"tarball-bytes",
    )
    .unwrap();

    let app = router(test_state(dir.path()).await);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/raw/alpha/stable/left-pad-1.3.0.tgz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/x-gzip"
    );
    assert_eq!(
        response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=\"left-pad-1.3.0.tgz\""
    );
    assert_eq!(body_string(response).await, "tarball-bytes");
}

#[tokio::test]
async fn get_missing_relic_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(test_state(dir.path()).await);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/raw/alpha/stable/absent.tgz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn xsendfile_offloads_to_nginx() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("alpha/stable")).unwrap();
    std::fs::write(dir.path().join("alpha/stable/big.tgz"), b"payload").unwrap();

    let mut settings = settings_for(dir.path());
    settings.reliquary.xsendfile_enabled = true;

    let store = Store::in_memory().await.unwrap();
    let app = router(AppState::new(store, settings));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/raw/alpha/stable/big.tgz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let redirect = response
        .headers()
        .get("X-Accel-Redirect")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(redirect.ends_with("alpha/stable/big.tgz"));
    assert_eq!(body_string(response).await, "");
}

#[tokio::test]
async fn xsendfile_other_frontend_is_unimplemented() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("alpha/stable")).unwrap();
    std::fs::write(dir.path().join("alpha/stable/big.tgz"), b"payload").unwrap();

    let mut settings = settings_for(dir.path());
    settings.reliquary.xsendfile_enabled = true;
    settings.reliquary.xsendfile_frontend = "apache".to_string();

    let store = Store::in_memory().await.unwrap();
    let app = router(AppState::new(store, settings));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/raw/alpha/stable/big.tgz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    assert!(body_string(response).await.contains("only nginx"));
}

#[tokio::test]
async fn autoindex_lists_cataloged_relics() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = router(state.clone());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/autoindex/alpha/stable/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_string(response).await,
        r#"{"status":"error","channel/index not found"}"#
    );

    let channel = state.store.upsert_channel("alpha").await.unwrap();
    let index = state.store.upsert_index(channel.id, "stable").await.unwrap();
    state
        .store
        .insert_relic(index.id, "left-pad-1.3.0.tgz", "1609459200.0", 13)
        .await
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/autoindex/alpha/stable/")
                .header(header::HOST, "repo.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains(
        "<a href=\"http://repo.example.com/api/v1/raw/alpha/stable/left-pad-1.3.0.tgz\">left-pad-1.3.0.tgz</a>"
    ));
    assert!(body.contains("01-Jan-2021 00:00"));
}

#[tokio::test]
async fn pypi_simple_pages() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = router(state.clone());

    let channel = state.store.upsert_channel("alpha").await.unwrap();
    let index = state.store.upsert_index(channel.id, "stable").await.unwrap();
    for name in [
        "pytz-2016.10.tar.gz",
        "pytz-2016.4.zip",
        "Zest.Releaser-6.7.1-py2.py3-none-any.whl",
    ] {
        state
            .store
            .insert_relic(index.id, name, "1.0", 10)
            .await
            .unwrap();
    }

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/python/alpha/stable/simple/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("<a href='pytz'>pytz</a><br/>"));
    assert!(body.contains("<a href='zest-releaser'>zest-releaser</a><br/>"));
    // One anchor per unique name.
    assert_eq!(body.matches("pytz").count(), 2);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/python/alpha/stable/simple/PYTZ/")
                .header(header::HOST, "repo.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("raw/alpha/stable/pytz-2016.10.tar.gz"));
    assert!(body.contains("rel='internal'"));
    assert!(!body.contains("Zest.Releaser"));
}

#[tokio::test]
async fn commonjs_registry_documents() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = router(state.clone());

    let channel = state.store.upsert_channel("alpha").await.unwrap();
    let index = state.store.upsert_index(channel.id, "stable").await.unwrap();
    for name in ["left-pad-1.3.0.tgz", "left-pad-1.4.0.tgz", "notes.txt"] {
        state
            .store
            .insert_relic(index.id, name, "1.0", 10)
            .await
            .unwrap();
    }

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/commonjs/alpha/stable/")
                .header(header::HOST, "repo.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let root: serde_json::Value =
        serde_json::from_str(&body_string(response).await).expect("registry root should be JSON");
    assert_eq!(
        root["left-pad"],
        "http://repo.example.com/api/v1/commonjs/alpha/stable/left-pad/"
    );
    assert!(root.get("notes.txt").is_some());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/commonjs/alpha/stable/left-pad/")
                .header(header::HOST, "repo.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let doc: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(doc["name"], "left-pad");
    assert_eq!(
        doc["versions"]["1.3.0"]["dist"]["tarball"],
        "http://repo.example.com/api/v1/raw/alpha/stable/left-pad-1.3.0.tgz"
    );
    assert!(doc["versions"]["1.4.0"].is_object());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/commonjs/alpha/stable/left-pad/1.4.0/")
                .header(header::HOST, "repo.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let doc: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(doc["version"], "1.4.0");
    assert_eq!(
        doc["dist"]["tarball"],
        "http://repo.example.com/api/v1/raw/alpha/stable/left-pad-1.4.0.tgz"
    );
}

fn hello_control() -> ControlParagraph {
    let mut control = ControlParagraph::default();
    control.set_field_from_string("Package", "hello");
    control.set_field_from_string("Version", "1.0");
    control.set_field_from_string("Architecture", "amd64");
    control.set_field_from_string("Maintainer", "Someone <someone@example.com>");
    control.set_field_from_string("Description", "a friendly greeter");
    control.set_field_from_string("Section", "utils");
    control
}

#[tokio::test]
async fn debian_tree_serves_generated_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let index_dir = dir.path().join("alpha/stable");
    std::fs::create_dir_all(&index_dir).unwrap();

    let deb = DebBuilder::new(hello_control()).to_vec().unwrap();
    std::fs::write(index_dir.join("hello_1.0_amd64.deb"), &deb).unwrap();

    let state = test_state(dir.path()).await;
    reindex(&state.store, &state.settings).await.unwrap();
    let app = router(state.clone());

    // Channel root lists dist and pool.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/debian/alpha/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains(">dist</a>"));
    assert!(body.contains(">pool</a>"));

    // The component listing discovers binary-amd64.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/debian/alpha/dist/stable/main/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains(">binary-amd64</a>"));

    // Packages carries the extracted control paragraph.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/debian/alpha/dist/stable/main/binary-amd64/Packages")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/plain"
    );
    let body = body_string(response).await;
    assert!(body.contains("Package: hello"));
    assert!(body.contains("Filename: pool/stable/hello_1.0_amd64.deb"));
    assert!(body.contains(&format!("Size: {}", deb.len())));

    // The compressed variant is served with its own content type.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/debian/alpha/dist/stable/main/binary-amd64/Packages.gz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/gzip"
    );

    // The per-arch Release stanza.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/debian/alpha/dist/stable/main/binary-amd64/Release")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_string(response).await,
        "Archive: reliquary\nComponent: main\nOrigin: reliquary\nLabel: reliquary\nArchitecture: amd64\n"
    );

    // The distribution Release cross-references all four files.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/debian/alpha/dist/stable/Release")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("Architectures: amd64\n"));
    for file in ["Packages", "Packages.gz", "Packages.bz2", "Release"] {
        assert!(body.contains(&format!("main/binary-amd64/{}\n", file)));
    }

    // Pool downloads hand back the package bytes.
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/debian/alpha/pool/stable/hello_1.0_amd64.deb")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/x-debian-package"
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(bytes.as_ref(), deb.as_slice());
}

#[tokio::test]
async fn commonjs_proxy_package_fetches_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = router(state.clone());

    // A throwaway upstream serving one tarball.
    let upstream_app = Router::new().route(
        "/left-pad-1.3.0.tgz",
        get(|| async { Bytes::from_static(b"upstream-tarball") }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, upstream_app).await.unwrap();
    });

    let uri = format!(
        "/api/v1/commonjs/proxy/package/alpha/stable/left-pad/1.3.0?upstream=http://{}/left-pad-1.3.0.tgz",
        addr
    );

    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri.as_str()).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/x-gzip"
    );
    assert_eq!(body_string(response).await, "upstream-tarball");

    // Persisted on disk and registered in the catalog.
    let stored = std::fs::read(dir.path().join("alpha/stable/left-pad-1.3.0.tgz")).unwrap();
    assert_eq!(stored, b"upstream-tarball");
    let relic = state
        .store
        .relic_by_names("alpha", "stable", "left-pad-1.3.0.tgz")
        .await
        .unwrap()
        .expect("relic should be cataloged");
    assert_eq!(relic.size, b"upstream-tarball".len() as i64);

    // A second request is served locally even with a dead upstream URL.
    let uri = "/api/v1/commonjs/proxy/package/alpha/stable/left-pad/1.3.0?upstream=http://127.0.0.1:1/dead";
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "upstream-tarball");
}

#[tokio::test]
async fn commonjs_proxy_package_requires_upstream_param() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(test_state(dir.path()).await);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/commonjs/proxy/package/alpha/stable/left-pad/1.3.0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_string(response).await,
        r#"{"status":"error","no upstream url given"}"#
    );
}

#[tokio::test]
async fn home_lists_channel_index_pairs() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = router(state.clone());

    let channel = state.store.upsert_channel("alpha").await.unwrap();
    state.store.upsert_index(channel.id, "stable").await.unwrap();
    state.store.upsert_index(channel.id, "testing").await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("alpha/stable"));
    assert!(body.contains("alpha/testing"));
}
