mod common;

use std::{path::Path, sync::Arc};

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use common::{make_session, orchestrator, FakeFetcher, FakeTools};
use stemdeck::{web, FsCatalog};
use tower::ServiceExt;

fn app(root: &Path) -> Router {
    let orch = orchestrator(root, FakeFetcher::ok(), Arc::new(FakeTools::all_stems()));
    let catalog = FsCatalog::new(orch.layout().sessions_root());
    web::build_router(web::AppState::new(Arc::new(orch), Arc::new(catalog)))
}

async fn get(app: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let resp = app
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, headers, body.to_vec())
}

async fn post_form(app: Router, form: &str) -> String {
    let resp = app
        .oneshot(
            Request::post("/process")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

#[tokio::test]
async fn empty_gallery_shows_notice() {
    let tmp = tempfile::tempdir().unwrap();
    let (status, _, body) = get(app(tmp.path()), "/").await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("No sessions found yet"));
    assert!(html.contains("action=\"/process\""));
}

#[tokio::test]
async fn missing_url_is_a_warning() {
    let tmp = tempfile::tempdir().unwrap();
    let html = post_form(app(tmp.path()), "url=&name=Song").await;
    assert!(html.contains("flash warning"));
    assert!(html.contains("The URL field is required."));
    // the name the user typed is kept
    assert!(html.contains("value=\"Song\""));
}

#[tokio::test]
async fn missing_name_is_a_warning() {
    let tmp = tempfile::tempdir().unwrap();
    let html = post_form(app(tmp.path()), "url=https%3A%2F%2Fyoutu.be%2Fx&name=").await;
    assert!(html.contains("Give the song a name."));
}

#[tokio::test]
async fn successful_submission_lists_the_session() {
    let tmp = tempfile::tempdir().unwrap();
    let html = post_form(
        app(tmp.path()),
        "url=https%3A%2F%2Fwww.youtube.com%2Fwatch%3Fv%3Dabc&name=Test+Song&view=1&show_mix=on",
    )
    .await;
    assert!(html.contains("flash success"), "{html}");
    assert!(html.contains("<h3>Test_Song</h3>"));
    assert!(html.contains("src=\"/sessions/Test_Song/mixed_audio.mp3\""));
    assert!(!html.contains("Individual stems</summary>"));
}

#[tokio::test]
async fn toggles_control_the_gallery() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("separated").join("htdemucs");
    make_session(&root, "Song", &["mixed_audio.mp3", "drums.mp3", "bass.mp3"], 0);

    let (_, _, body) = get(app(tmp.path()), "/").await;
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("/sessions/Song/mixed_audio.mp3"));
    assert!(!html.contains("/sessions/Song/drums.mp3"));

    let (_, _, body) = get(app(tmp.path()), "/?view=1&show_stems=on").await;
    let html = String::from_utf8(body).unwrap();
    assert!(!html.contains("/sessions/Song/mixed_audio.mp3"));
    assert!(html.contains("/sessions/Song/drums.mp3"));
    assert!(html.contains("download=\"Song_drums.mp3\""));
}

#[tokio::test]
async fn artifacts_stream_inline_and_as_download() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("separated").join("htdemucs");
    make_session(&root, "Song", &["mixed_audio.mp3", "vocals.wav"], 0);

    let (status, headers, body) = get(app(tmp.path()), "/sessions/Song/mixed_audio.mp3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "audio/mpeg");
    assert!(headers.get(header::CONTENT_DISPOSITION).is_none());
    assert_eq!(body, b"data");

    let (status, headers, _) =
        get(app(tmp.path()), "/sessions/Song/mixed_audio.mp3/download").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"Song_mix.mp3\""
    );

    let (_, headers, _) = get(app(tmp.path()), "/sessions/Song/vocals.wav/download").await;
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"Song_vocals.wav\""
    );
}

#[tokio::test]
async fn unknown_or_escaping_paths_are_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("separated").join("htdemucs");
    make_session(&root, "Song", &["mixed_audio.mp3"], 0);
    std::fs::write(root.join("Song").join("secret.txt"), b"no").unwrap();

    for uri in [
        "/sessions/Nope/mixed_audio.mp3",
        "/sessions/Song/secret.txt",
        "/sessions/Song/drums.mp3",
        "/sessions/..%2F..%2Fsrc/mixed_audio.mp3",
    ] {
        let (status, _, _) = get(app(tmp.path()), uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn health_reports_ok() {
    let tmp = tempfile::tempdir().unwrap();
    let (status, _, body) = get(app(tmp.path()), "/health").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "stemdeck");
}
