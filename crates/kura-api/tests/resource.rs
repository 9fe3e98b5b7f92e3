//! Status-code contract of the resource controller over the in-memory store.

use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::json;

use kura_api::{Body, Payload, ResourceController, Response, StatusCode};
use kura_vfs::store::collect_bytes;
use kura_vfs::{FileService, MemoryStore, ObjectStore, OpContext, TenantId, UploadFile};

const LIMIT: u64 = 1024;

fn setup() -> (ResourceController, Arc<MemoryStore>, OpContext) {
    let store = Arc::new(MemoryStore::new());
    let controller = ResourceController::new(FileService::new(store.clone()), LIMIT);
    (controller, store, OpContext::new(TenantId::new(7)))
}

async fn seed(store: &MemoryStore, objects: &[(&str, &str)]) {
    for (key, body) in objects {
        store.put_bytes(key, Bytes::from(body.to_string())).await.unwrap();
    }
}

fn message(resp: &Response) -> Option<&str> {
    resp.json_body()?.get("message")?.as_str()
}

#[tokio::test]
async fn test_show() {
    let (api, store, ctx) = setup();
    seed(&store, &[("user-7-files/docs/a.txt", "hello")]).await;

    let resp = api.show(&ctx, Some("/docs/a.txt")).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(
        resp.json_body(),
        Some(&json!({"path": "/docs/a.txt", "name": "a.txt", "size": 5, "type": "FILE"}))
    );

    for bad in [None, Some(""), Some("../../etc/passwd"), Some("/docs/missing.txt")] {
        let resp = api.show(&ctx, bad).await;
        assert_eq!(resp.status, StatusCode::NOT_FOUND, "{bad:?}");
        assert_eq!(message(&resp), Some("Not found"));
    }
}

#[tokio::test]
async fn test_directory_store_and_show() {
    let (api, _store, ctx) = setup();

    let resp = api.directory_store(&ctx, Some("/new/")).await;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(
        resp.json_body(),
        Some(&json!({"path": "/new/", "name": "new", "size": 0, "type": "DIRECTORY"}))
    );

    let resp = api.directory_show(&ctx, Some("/")).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json_body().and_then(|j| j.as_array()).map(Vec::len), Some(1));

    let resp = api.directory_store(&ctx, Some("../x/")).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(message(&resp), Some("Bad request"));

    let resp = api.directory_show(&ctx, None).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_store_upload() {
    let (api, store, ctx) = setup();
    let files = vec![
        UploadFile::from_bytes("x.txt", "x"),
        UploadFile::from_bytes("y.txt", "yy"),
    ];

    let resp = api
        .store(&ctx, Some("/f1/"), Some(r#"{"x.txt":"/f1/","y.txt":"/f1/sub/"}"#), files)
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(
        resp.json_body(),
        Some(&json!([
            {"path": "/f1/x.txt", "name": "x.txt", "size": 1, "type": "FILE"},
            {"path": "/f1/sub/y.txt", "name": "y.txt", "size": 2, "type": "FILE"},
        ]))
    );
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn test_store_rejects_bad_requests() {
    let (api, store, ctx) = setup();

    let cases: Vec<(Option<&str>, Option<&str>, &str)> = vec![
        (Some("/f1/"), Some("not json"), "x.txt"),
        (Some("/f1/"), None, "x.txt"),
        (Some("/f1/"), Some(r#"{"other.txt":"/f1/"}"#), "x.txt"),
        (None, Some(r#"{"x.txt":"/f1/"}"#), "x.txt"),
    ];
    for (path, paths, name) in cases {
        let resp = api
            .store(&ctx, path, paths, vec![UploadFile::from_bytes(name, "x")])
            .await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST, "{path:?} {paths:?}");
    }

    let too_big = UploadFile::from_bytes("big.bin", vec![0u8; LIMIT as usize + 1]);
    let resp = api
        .store(&ctx, Some("/"), Some(r#"{"big.bin":""}"#), vec![too_big])
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    assert!(store.is_empty());
}

#[tokio::test]
async fn test_delete() {
    let (api, store, ctx) = setup();
    seed(&store, &[("user-7-files/a.txt", "a")]).await;

    assert_eq!(api.delete(&ctx, Some("/a.txt")).await.status, StatusCode::NO_CONTENT);
    assert_eq!(api.delete(&ctx, Some("/a.txt")).await.status, StatusCode::NOT_FOUND);
    assert_eq!(api.delete(&ctx, Some("")).await.status, StatusCode::BAD_REQUEST);
    assert!(matches!(api.delete(&ctx, Some("/a.txt")).await.body, Body::Json(_)));
}

#[tokio::test]
async fn test_move() {
    let (api, store, ctx) = setup();
    seed(&store, &[("user-7-files/a/x.txt", "x")]).await;

    let resp = api.move_resource(&ctx, Some("/a/"), Some("/b/")).await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
    assert_eq!(store.keys(), vec!["user-7-files/b/x.txt"]);

    for (from, to) in [
        (Some("/b/"), Some("/b/c/")),
        (Some("/"), Some("/z/")),
        (None, Some("/z/")),
        (Some("/b/"), None),
        (Some("/missing.txt"), Some("/z.txt")),
    ] {
        let resp = api.move_resource(&ctx, from, to).await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST, "{from:?} -> {to:?}");
    }
}

#[tokio::test]
async fn test_download_file_and_directory() {
    let (api, store, ctx) = setup();
    seed(
        &store,
        &[("user-7-files/d/", ""), ("user-7-files/d/a.txt", "A"), ("user-7-files/d/b.txt", "B")],
    )
    .await;

    let resp = api.download(&ctx, Some("/d/a.txt")).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.content_disposition().as_deref(), Some("attachment; filename=\"a.txt\""));
    match resp.body {
        Body::Attachment {
            payload: Payload::Stream { size, body },
            ..
        } => {
            assert_eq!(size, 1);
            assert_eq!(collect_bytes(body).await.unwrap(), "A");
        }
        other => panic!("unexpected body: {other:?}"),
    }

    let resp = api.download(&ctx, Some("/d/")).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(
        resp.content_disposition().as_deref(),
        Some("attachment; filename=\"archive.zip\"")
    );
    match resp.body {
        Body::Attachment {
            payload: Payload::Buffer(buf),
            ..
        } => {
            let archive = zip::ZipArchive::new(Cursor::new(buf)).unwrap();
            assert_eq!(archive.len(), 2);
        }
        other => panic!("unexpected body: {other:?}"),
    }

    let resp = api.download(&ctx, Some("/d/missing.txt")).await;
    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(message(&resp), Some("Server error"));

    let resp = api.download(&ctx, Some("../../x")).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search() {
    let (api, store, ctx) = setup();
    seed(&store, &[("user-7-files/a/report.pdf", "r"), ("user-7-files/b/x.txt", "x")]).await;

    let resp = api.search(&ctx, Some("report")).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(
        resp.json_body(),
        Some(&json!([{"path": "/a/report.pdf", "name": "report.pdf", "size": 1, "type": "FILE"}]))
    );

    assert_eq!(api.search(&ctx, Some("")).await.status, StatusCode::BAD_REQUEST);
    assert_eq!(api.search(&ctx, None).await.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_error_bodies_leak_no_keys() {
    let (api, _store, ctx) = setup();
    let responses = [
        api.show(&ctx, Some("/nope")).await,
        api.delete(&ctx, Some("/nope")).await,
        api.download(&ctx, Some("/nope")).await,
    ];
    for resp in &responses {
        let body = resp.json_body().map(ToString::to_string).unwrap_or_default();
        assert!(!body.contains("user-7-files"), "{body}");
    }
}
