use reqwest::Method;

use crate::common::{TestApp, multipart_body};

mod upload_flow {
    use super::*;

    #[tokio::test]
    async fn upload_redirects_to_short_link() {
        let app = TestApp::spawn().await;

        let res = app.upload("test.txt", b"test").await;

        assert_eq!(res.status, 303);
        let location = res.location();
        assert!(location.starts_with('/'));
        assert!(location.ends_with(".txt"));
        assert_eq!(location.len(), 1 + 12 + 4);
        assert_eq!(res.text(), format!("{location}\n"));
        assert_eq!(res.header("content-type"), "text/plain; charset=utf-8");
    }

    #[tokio::test]
    async fn uploaded_file_can_be_downloaded() {
        let app = TestApp::spawn().await;
        let location = app.upload_ok("test.txt", b"test").await;

        let res = app.get(&location).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.bytes, b"test");
        assert_eq!(res.header("content-length"), "4");
        assert_eq!(
            res.header("content-disposition"),
            "inline; filename=\"test.txt\"; filename*=UTF-8''test.txt"
        );
        assert_eq!(res.header("x-content-type-options"), "nosniff");
        assert!(res.header("etag").starts_with('"'));
        assert!(
            res.header("cache-control")
                .starts_with("public, must-revalidate, max-age=")
        );
        assert!(res.headers.contains_key("expires"));
        assert!(res.headers.contains_key("last-modified"));
    }

    #[tokio::test]
    async fn name_without_extension_gets_bare_link() {
        let app = TestApp::spawn().await;
        let location = app.upload_ok("README", b"read me").await;
        assert_eq!(location.len(), 1 + 12);
    }

    #[tokio::test]
    async fn files_without_lifetime_are_cached_forever() {
        let app = TestApp::spawn_with(|config| config.storage.lifetime_secs = 0).await;
        let location = app.upload_ok("a.txt", b"forever").await;

        let res = app.get(&location).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.header("cache-control"), "max-age=31536000");
        assert!(!res.headers.contains_key("expires"));
    }
}

mod deduplication {
    use super::*;

    #[tokio::test]
    async fn identical_content_is_stored_once() {
        let app = TestApp::spawn().await;

        let first = app.upload_ok("a.txt", b"same bytes").await;
        let second = app.upload_ok("b.bin", b"same bytes").await;

        assert_ne!(first, second);
        assert_eq!(app.blob_count(), 1);
        assert_eq!(app.repository.len(), 2);

        for location in [&first, &second] {
            let res = app.get(location).await;
            assert_eq!(res.status, 200);
            assert_eq!(res.bytes, b"same bytes");
        }
        assert!(
            app.get(&second)
                .await
                .header("content-disposition")
                .contains("filename=\"b.bin\"")
        );
    }

    #[tokio::test]
    async fn concurrent_identical_uploads_both_succeed() {
        let app = TestApp::spawn().await;
        let data = vec![42u8; 64 * 1024];

        let (a, b) = tokio::join!(app.upload("x.bin", &data), app.upload("y.bin", &data));

        assert_eq!(a.status, 303);
        assert_eq!(b.status, 303);
        assert_ne!(a.location(), b.location());
        assert_eq!(app.blob_count(), 1);
        assert_eq!(app.staging_entries(), 0);

        for location in [a.location(), b.location()] {
            assert_eq!(app.get(location).await.bytes, data);
        }
    }
}

mod rejections {
    use futures::stream;

    use super::*;

    #[tokio::test]
    async fn declared_length_over_max_is_rejected() {
        let app = TestApp::spawn_with(|config| config.storage.max_upload_size = 1024).await;

        let res = app.upload("big.bin", &[0u8; 2048]).await;

        assert_eq!(res.status, 413);
        assert!(res.headers.get("location").is_none());
        assert!(app.repository.is_empty());
        assert_eq!(app.staging_entries(), 0);
    }

    #[tokio::test]
    async fn oversized_body_without_length_is_rejected() {
        let app = TestApp::spawn_with(|config| config.storage.max_upload_size = 1024).await;
        let (content_type, body) = multipart_body("file", "big.bin", &[7u8; 4096]);

        let chunks: Vec<Result<Vec<u8>, std::io::Error>> =
            body.chunks(512).map(|c| Ok(c.to_vec())).collect();
        let res = app
            .client
            .post(app.url("/"))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(reqwest::Body::wrap_stream(stream::iter(chunks)))
            .send()
            .await
            .expect("Failed to send upload request");

        let status = res.status().as_u16();
        assert!(status == 413 || status == 400, "unexpected status {status}");
        assert!(app.repository.is_empty());
        assert_eq!(app.staging_entries(), 0);
        assert_eq!(app.blob_count(), 0);
    }

    #[tokio::test]
    async fn file_exactly_at_limit_is_accepted() {
        let app = TestApp::spawn_with(|config| config.storage.max_upload_size = 1024).await;
        let (content_type, body) = multipart_body("file", "edge.bin", &[1u8; 1024]);

        // Declared length includes multipart framing, so stream it instead.
        let res = app
            .client
            .post(app.url("/"))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(reqwest::Body::wrap_stream(stream::iter([Ok::<_, std::io::Error>(body)])))
            .send()
            .await
            .unwrap();

        assert_eq!(res.status().as_u16(), 303);
        assert_eq!(app.repository.len(), 1);
    }

    #[tokio::test]
    async fn long_name_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app.upload(&"a".repeat(256), b"data").await;

        assert_eq!(res.status, 400);
        assert!(res.headers.get("location").is_none());
        assert!(app.repository.is_empty());
        assert_eq!(app.staging_entries(), 0);
    }

    #[tokio::test]
    async fn name_of_255_characters_is_accepted() {
        let app = TestApp::spawn().await;
        let res = app.upload(&"a".repeat(255), b"data").await;
        assert_eq!(res.status, 303);
    }

    #[tokio::test]
    async fn missing_file_part_is_rejected() {
        let app = TestApp::spawn().await;
        let (content_type, body) = multipart_body("attachment", "a.txt", b"data");

        let res = app
            .client
            .post(app.url("/"))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .unwrap();

        assert_eq!(res.status().as_u16(), 400);
        assert!(app.repository.is_empty());
    }

    #[tokio::test]
    async fn non_multipart_body_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app
            .client
            .post(app.url("/"))
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body("just text")
            .send()
            .await
            .unwrap();

        assert_eq!(res.status().as_u16(), 400);
    }

    #[tokio::test]
    async fn post_elsewhere_is_not_allowed() {
        let app = TestApp::spawn().await;

        let res = app.request(Method::POST, "/somefile", &[]).await;

        assert_eq!(res.status, 405);
        assert_eq!(res.header("allow"), "GET, HEAD, OPTIONS");
    }
}

mod interrupted {
    use std::time::Duration;

    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;

    use super::*;

    async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..250 {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        condition()
    }

    #[tokio::test]
    async fn client_disconnect_discards_partial_upload() {
        let app = TestApp::spawn().await;
        let (content_type, body) = multipart_body("file", "big.bin", &vec![b'x'; 256 * 1024]);

        let mut stream = TcpStream::connect(app.addr).await.unwrap();
        let head = format!(
            "POST / HTTP/1.1\r\nHost: {}\r\nContent-Type: {content_type}\r\n\
             Content-Length: {}\r\n\r\n",
            app.addr,
            body.len()
        );
        stream.write_all(head.as_bytes()).await.unwrap();
        stream.write_all(&body[..body.len() / 2]).await.unwrap();
        stream.flush().await.unwrap();

        assert!(
            wait_until(|| app.staging_entries() == 1).await,
            "upload never reached the staging area"
        );

        drop(stream);

        assert!(
            wait_until(|| app.staging_entries() == 0).await,
            "staged upload was left behind"
        );
        assert!(app.repository.is_empty());
        assert_eq!(app.blob_count(), 0);
    }
}
