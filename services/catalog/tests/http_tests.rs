mod common;

use axum::http::StatusCode;
use common::*;

#[tokio::test]
async fn test_add_two_images_then_list() {
    let app = TestApp::new().await;

    let form = MultipartForm::new()
        .text("saree_id", "SAR001")
        .file("images", "front.jpg", b"front-bytes")
        .file("images", "back.png", b"back-bytes");
    let response = app.post_multipart("/add", form).await;

    assert_redirect(&response, "/");
    let cookie = notice_cookie(&response).expect("success notice cookie");

    let stored = app.stored_files("SAR001");
    assert_eq!(stored.len(), 2);

    let page = body_text(app.get("/", Some(&cookie)).await).await;
    assert!(page.contains("Saree &#x27;SAR001&#x27; added successfully."));
    assert!(page.contains("notice-success"));
    assert_eq!(page.matches("<h2>SAR001</h2>").count(), 1);

    let first = page.find(&format!("/uploads/SAR001/{}", stored[0])).unwrap();
    let second = page.find(&format!("/uploads/SAR001/{}", stored[1])).unwrap();
    assert!(first < second);
}

#[tokio::test]
async fn test_notice_shown_once() {
    let app = TestApp::new().await;

    let response = app
        .post_multipart("/add", MultipartForm::new().text("saree_id", "SAR005"))
        .await;
    let cookie = notice_cookie(&response).unwrap();

    let response = app.get("/", Some(&cookie)).await;
    let cleared = notice_cookie(&response).unwrap();
    assert!(body_text(response).await.contains("added successfully"));

    let page = body_text(app.get("/", Some(&cleared)).await).await;
    assert!(!page.contains("added successfully"));
}

#[tokio::test]
async fn test_notice_signed_with_other_secret_is_expired() {
    let app = TestApp::new().await;

    let response = app.get("/add", Some("catalog_notice=bm90LXNpZ25lZA")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(axum::http::header::SET_COOKIE)
        .expect("stale notice is expired")
        .to_str()
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with("catalog_notice="));
    assert!(set_cookie.contains("Max-Age=0"));
    assert!(!body_text(response).await.contains(r#"role="status""#));
}

#[tokio::test]
async fn test_add_empty_identifier_redirects_with_warning() {
    let app = TestApp::new().await;

    let form = MultipartForm::new()
        .text("saree_id", "   ")
        .file("images", "front.jpg", b"front-bytes");
    let response = app.post_multipart("/add", form).await;

    assert_redirect(&response, "/add");
    assert_eq!(app.items.count().await.unwrap(), 0);

    let cookie = notice_cookie(&response).unwrap();
    let page = body_text(app.get("/add", Some(&cookie)).await).await;
    assert!(page.contains("notice-warning"));
    assert!(page.contains("Please provide or scan a Saree ID first."));
}

#[tokio::test]
async fn test_add_path_identifier_rejected() {
    let app = TestApp::new().await;

    let response = app
        .post_multipart("/add", MultipartForm::new().text("saree_id", "../etc"))
        .await;

    assert_redirect(&response, "/add");
    assert_eq!(app.items.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_add_same_identifier_twice_single_record() {
    let app = TestApp::new().await;

    for name in ["one.png", "two.png"] {
        let form = MultipartForm::new()
            .text("saree_id", "SAR002")
            .file("images", name, b"bytes");
        assert_redirect(&app.post_multipart("/add", form).await, "/");
    }

    assert_eq!(app.items.count().await.unwrap(), 1);
    assert_eq!(app.stored_files("SAR002").len(), 2);
}

#[tokio::test]
async fn test_add_skips_disallowed_and_empty_parts() {
    let app = TestApp::new().await;

    let form = MultipartForm::new()
        .text("saree_id", "SAR003")
        .file("images", "", b"")
        .file("images", "notes.txt", b"text")
        .file("images", "front.JPEG", b"jpeg");
    assert_redirect(&app.post_multipart("/add", form).await, "/");

    let stored = app.stored_files("SAR003");
    assert_eq!(stored.len(), 1);
    assert!(stored[0].ends_with("_front.JPEG"));
}

#[tokio::test]
async fn test_same_original_name_stored_twice() {
    let app = TestApp::new().await;

    let form = MultipartForm::new()
        .text("saree_id", "SAR004")
        .file("images", "photo.png", b"first")
        .file("images", "photo.png", b"second");
    app.post_multipart("/add", form).await;

    let stored = app.stored_files("SAR004");
    assert_eq!(stored.len(), 2);
    assert_ne!(stored[0], stored[1]);
}

#[tokio::test]
async fn test_search_filters_case_insensitively() {
    let app = TestApp::new().await;
    for id in ["Banarasi-01", "kanjivaram-02", "BANARASI-03"] {
        app.post_multipart("/add", MultipartForm::new().text("saree_id", id))
            .await;
    }

    let page = body_text(app.get("/?q=%20banarasi%20", None).await).await;
    assert!(page.contains("<h2>Banarasi-01</h2>"));
    assert!(page.contains("<h2>BANARASI-03</h2>"));
    assert!(!page.contains("<h2>kanjivaram-02</h2>"));
    assert!(page.contains(r#"value="banarasi""#));

    let page = body_text(app.get("/?q=", None).await).await;
    assert_eq!(page.matches("<h2>").count(), 3);

    let page = body_text(app.get("/?q=linen", None).await).await;
    assert!(page.contains("No sarees match"));
}

#[tokio::test]
async fn test_listing_ignores_foreign_files() {
    let app = TestApp::new().await;
    app.post_multipart(
        "/add",
        MultipartForm::new()
            .text("saree_id", "SAR006")
            .file("images", "a.gif", b"gif"),
    )
    .await;

    std::fs::write(app.upload_root.join("SAR006").join("readme.txt"), b"x").unwrap();

    let page = body_text(app.get("/", None).await).await;
    assert!(!page.contains("readme.txt"));
    assert_eq!(page.matches("/uploads/SAR006/").count(), 2); // href + src
}

#[tokio::test]
async fn test_uploads_served_as_files() {
    let app = TestApp::new().await;
    app.post_multipart(
        "/add",
        MultipartForm::new()
            .text("saree_id", "SAR007")
            .file("images", "pallu.png", b"png-bytes"),
    )
    .await;

    let stored = app.stored_files("SAR007");
    assert!(file_exists(&app.upload_root, "SAR007", &stored[0]));

    let response = app.get(&format!("/uploads/SAR007/{}", stored[0]), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "png-bytes");

    let response = app.get("/uploads/SAR007/missing.png", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.get("/uploads/SAR007/../../secret.png", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_decode_qr_payload() {
    let app = TestApp::new().await;

    let form = MultipartForm::new().file("qr_image", "label.png", &qr_png("HELLO"));
    let response = app.post_multipart("/decode-qr", form).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({ "ok": true, "results": ["HELLO"] })
    );
}

#[tokio::test]
async fn test_decode_qr_none_found_is_success_status() {
    let app = TestApp::new().await;

    let form = MultipartForm::new().file("qr_image", "photo.png", &photo_png());
    let response = app.post_multipart("/decode-qr", form).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({ "ok": false, "error": "No QR code found" })
    );
}

#[tokio::test]
async fn test_decode_qr_missing_part() {
    let app = TestApp::new().await;

    let form = MultipartForm::new().text("something_else", "x");
    let response = app.post_multipart("/decode-qr", form).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({ "ok": false, "error": "No file part 'qr_image'" })
    );
}

#[tokio::test]
async fn test_decode_qr_not_multipart() {
    let app = TestApp::new().await;

    let response = app.get("/decode-qr", None).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/decode-qr")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No file part 'qr_image'");
}

#[tokio::test]
async fn test_decode_qr_empty_filename() {
    let app = TestApp::new().await;

    let form = MultipartForm::new().file("qr_image", "", b"");
    let response = app.post_multipart("/decode-qr", form).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({ "ok": false, "error": "No selected file" })
    );
}

#[tokio::test]
async fn test_decode_qr_corrupt_image_is_server_error() {
    let app = TestApp::new().await;

    let form = MultipartForm::new().file("qr_image", "broken.png", b"not really a png");
    let response = app.post_multipart("/decode-qr", form).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["ok"], false);
    assert!(body["error"].as_str().unwrap().starts_with("Failed to decode image"));
}

#[tokio::test]
async fn test_health_and_readiness() {
    let app = TestApp::new().await;

    let response = app.get("/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");

    let response = app.get("/ready", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["database"], "connected");
}
