use ::common::storage::{BlobStore, ContentHash};
use chrono::{SubsecRound, TimeDelta, Utc};
use reqwest::Method;
use server::repository::{FileEntry, FileRepository};

use crate::common::{INDEX_HTML, TestApp};

mod retrieval {
    use super::*;

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let app = TestApp::spawn().await;
        let res = app.get("/AAAAAAAAAAAA.txt").await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn extension_in_link_is_ignored() {
        let app = TestApp::spawn().await;
        let location = app.upload_ok("notes.txt", b"hello").await;
        let id = location.trim_start_matches('/').split('.').next().unwrap();

        for path in [format!("/{id}"), format!("/{id}.png"), format!("/{id}.tar.gz")] {
            let res = app.get(&path).await;
            assert_eq!(res.status, 200, "{path}");
            assert_eq!(res.bytes, b"hello");
            assert_eq!(res.header("content-type"), "text/plain");
        }
    }

    #[tokio::test]
    async fn nested_path_is_not_found() {
        let app = TestApp::spawn().await;
        let location = app.upload_ok("a.txt", b"a").await;

        let res = app.get(&format!("{location}/extra")).await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn expired_file_is_not_found_while_row_remains() {
        let app = TestApp::spawn().await;
        let checksum = app.store.put(b"old news").await.unwrap();
        let now = Utc::now().trunc_subsecs(0);
        app.repository.insert(FileEntry {
            id: "expiredfile1".into(),
            name: "old.txt".into(),
            size: 8,
            checksum,
            timestamp: now - TimeDelta::days(2),
            expires: Some(now - TimeDelta::days(1)),
        });

        let res = app.get("/expiredfile1.txt").await;

        assert_eq!(res.status, 404);
        assert!(app.repository.lookup("expiredfile1").await.is_ok());
        assert!(app.store.exists(&checksum).await.unwrap());
    }

    #[tokio::test]
    async fn missing_blob_is_not_found() {
        let app = TestApp::spawn().await;
        app.repository.insert(FileEntry {
            id: "orphanfile01".into(),
            name: "gone.txt".into(),
            size: 4,
            checksum: ContentHash::compute(b"gone"),
            timestamp: Utc::now(),
            expires: None,
        });

        assert_eq!(app.get("/orphanfile01").await.status, 404);
    }

    #[tokio::test]
    async fn sniffed_html_is_served_as_plain_text() {
        let app = TestApp::spawn().await;
        let location = app
            .upload_ok("page", b"<!DOCTYPE html><html><script>alert(1)</script></html>")
            .await;

        let res = app.get(&location).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.header("content-type"), "text/plain; charset=utf-8");
        assert_eq!(res.header("x-content-type-options"), "nosniff");
    }

    #[tokio::test]
    async fn html_extension_is_served_as_plain_text() {
        let app = TestApp::spawn().await;
        let location = app.upload_ok("evil.html", b"<h1>hi</h1>").await;

        let res = app.get(&location).await;
        assert_eq!(res.header("content-type"), "text/plain");
    }

    #[tokio::test]
    async fn sniffed_xml_is_served_as_plain_text() {
        let app = TestApp::spawn().await;
        let location = app
            .upload_ok(
                "feed",
                b"<?xml version=\"1.0\"?><html xmlns=\"http://www.w3.org/1999/xhtml\"/>",
            )
            .await;

        let res = app.get(&location).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.header("content-type"), "text/plain; charset=utf-8");
    }

    #[tokio::test]
    async fn svg_extension_is_served_as_plain_text() {
        let app = TestApp::spawn().await;
        let location = app
            .upload_ok("drawing.svg", b"<svg><script>alert(1)</script></svg>")
            .await;

        let res = app.get(&location).await;
        assert_eq!(res.header("content-type"), "text/plain");
    }

    #[tokio::test]
    async fn punctuated_extension_link_resolves() {
        let app = TestApp::spawn().await;
        let location = app.upload_ok("notes.c++", b"int main() {}").await;
        assert!(location.ends_with(".c++"), "{location}");

        let res = app.get(&location).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.bytes, b"int main() {}");
    }

    #[tokio::test]
    async fn binary_content_type_from_extension() {
        let app = TestApp::spawn().await;
        let location = app.upload_ok("photo.png", b"not really a png").await;

        let res = app.get(&location).await;
        assert_eq!(res.header("content-type"), "image/png");
    }
}

mod transfer {
    use super::*;

    #[tokio::test]
    async fn head_returns_headers_only() {
        let app = TestApp::spawn().await;
        let location = app.upload_ok("a.txt", b"abcdef").await;

        let res = app.request(Method::HEAD, &location, &[]).await;

        assert_eq!(res.status, 200);
        assert!(res.bytes.is_empty());
        assert_eq!(res.header("accept-ranges"), "bytes");
    }

    #[tokio::test]
    async fn range_request_returns_partial_content() {
        let app = TestApp::spawn().await;
        let location = app.upload_ok("a.txt", b"abcdef").await;

        let res = app
            .request(Method::GET, &location, &[("range", "bytes=2-3")])
            .await;

        assert_eq!(res.status, 206);
        assert_eq!(res.bytes, b"cd");
        assert_eq!(res.header("content-range"), "bytes 2-3/6");
    }

    #[tokio::test]
    async fn unsatisfiable_range() {
        let app = TestApp::spawn().await;
        let location = app.upload_ok("a.txt", b"abcdef").await;

        let res = app
            .request(Method::GET, &location, &[("range", "bytes=10-")])
            .await;

        assert_eq!(res.status, 416);
        assert_eq!(res.header("content-range"), "bytes */6");
    }

    #[tokio::test]
    async fn matching_etag_is_not_modified() {
        let app = TestApp::spawn().await;
        let location = app.upload_ok("a.txt", b"abcdef").await;
        let etag = app.get(&location).await.header("etag").to_string();
        assert_eq!(
            etag,
            format!("\"{}\"", ContentHash::compute(b"abcdef").to_hex())
        );

        let res = app
            .request(Method::GET, &location, &[("if-none-match", etag.as_str())])
            .await;

        assert_eq!(res.status, 304);
        assert!(res.bytes.is_empty());
    }

    #[tokio::test]
    async fn unchanged_since_last_modified_is_not_modified() {
        let app = TestApp::spawn().await;
        let location = app.upload_ok("a.txt", b"abcdef").await;
        let last_modified = app.get(&location).await.header("last-modified").to_string();

        let res = app
            .request(
                Method::GET,
                &location,
                &[("if-modified-since", last_modified.as_str())],
            )
            .await;

        assert_eq!(res.status, 304);
    }
}

mod methods {
    use super::*;

    #[tokio::test]
    async fn options_lists_allowed_methods() {
        let app = TestApp::spawn().await;

        let res = app.request(Method::OPTIONS, "/anything", &[]).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.header("access-control-allow-methods"), "GET, HEAD, OPTIONS");

        let res = app.request(Method::OPTIONS, "/", &[]).await;
        assert_eq!(res.status, 200);
        assert_eq!(
            res.header("access-control-allow-methods"),
            "GET, HEAD, OPTIONS, POST"
        );
    }

    #[tokio::test]
    async fn other_methods_are_not_allowed() {
        let app = TestApp::spawn().await;
        let location = app.upload_ok("a.txt", b"a").await;

        let res = app.request(Method::DELETE, &location, &[]).await;
        assert_eq!(res.status, 405);
        assert_eq!(res.header("allow"), "GET, HEAD, OPTIONS");

        let res = app.request(Method::PUT, "/", &[]).await;
        assert_eq!(res.status, 405);
        assert_eq!(res.header("allow"), "GET, HEAD, OPTIONS, POST");
    }
}

mod static_assets {
    use super::*;

    #[tokio::test]
    async fn root_serves_index_page() {
        let app = TestApp::spawn().await;

        let res = app.get("/").await;

        assert_eq!(res.status, 200);
        assert_eq!(res.text(), INDEX_HTML);
        assert_eq!(res.header("content-type"), "text/html");
        assert_eq!(res.header("cache-control"), "max-age=31536000");
        assert!(res.header("etag").starts_with("W/\""));
    }

    #[tokio::test]
    async fn nested_asset_is_served() {
        let app = TestApp::spawn().await;

        let res = app.get("/css/site.css").await;

        assert_eq!(res.status, 200);
        assert_eq!(res.header("content-type"), "text/css");
    }

    #[tokio::test]
    async fn asset_revalidation_uses_weak_etag() {
        let app = TestApp::spawn().await;
        let etag = app.get("/css/site.css").await.header("etag").to_string();

        let res = app
            .request(Method::GET, "/css/site.css", &[("if-none-match", etag.as_str())])
            .await;
        assert_eq!(res.status, 304);
    }

    #[tokio::test]
    async fn missing_asset_directory_is_not_found() {
        let app = TestApp::spawn().await;
        assert_eq!(app.get("/css/missing.css").await.status, 404);
    }
}

#[tokio::test]
async fn openapi_document_answers_other_methods() {
    let app = TestApp::spawn().await;

    let res = app
        .request(Method::OPTIONS, "/api-docs/openapi.json", &[])
        .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.header("access-control-allow-methods"), "GET, HEAD, OPTIONS");

    let res = app
        .request(Method::DELETE, "/api-docs/openapi.json", &[])
        .await;
    assert_eq!(res.status, 405);
    assert_eq!(res.header("allow"), "GET, HEAD, OPTIONS");
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::spawn().await;

    let res = app.get("/api-docs/openapi.json").await;

    assert_eq!(res.status, 200);
    let doc: serde_json::Value = serde_json::from_slice(&res.bytes).unwrap();
    assert!(doc["paths"]["/"]["post"].is_object());
    assert!(doc["paths"]["/{file}"]["get"].is_object());
}
