//! Shared harness for HTTP-level tests.

#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use qrcode::{Color, QrCode};
use saree_catalog::config::ApiConfig;
use saree_catalog::flash::signing_key;
use saree_catalog::{create_router, AppState, CatalogService, ImageFolder, ItemStore, QrDecoder};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const BOUNDARY: &str = "catalog-test-boundary";

/// Router wired to an in-memory database and a temporary upload root
pub struct TestApp {
    pub router: Router,
    pub items: Arc<ItemStore>,
    pub upload_root: PathBuf,
    _tmp: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let images = Arc::new(ImageFolder::open(tmp.path().join("uploads")).await.unwrap());
        let items = Arc::new(ItemStore::in_memory().await.unwrap());

        let state = AppState {
            catalog: Arc::new(CatalogService::new(items.clone(), images.clone())),
            items: items.clone(),
            qr_decoder: QrDecoder::default(),
            upload_root: images.root().to_path_buf(),
            cookie_key: signing_key("integration-test-secret"),
        };

        Self {
            router: create_router(state, &ApiConfig::default()),
            items,
            upload_root: images.root().to_path_buf(),
            _tmp: tmp,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_multipart(&self, uri: &str, form: MultipartForm) -> Response<Body> {
        let (content_type, body) = form.finish();
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    pub fn stored_files(&self, identifier: &str) -> Vec<String> {
        let dir = self.upload_root.join(identifier);
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter_map(|e| e.file_name().into_string().ok())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}

/// Hand-built `multipart/form-data` body
#[derive(Default)]
pub struct MultipartForm {
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn finish(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        (format!("multipart/form-data; boundary={BOUNDARY}"), self.body)
    }
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// `name=value` of the first Set-Cookie header, ready for a Cookie header
pub fn notice_cookie(response: &Response<Body>) -> Option<String> {
    let value = response.headers().get(header::SET_COOKIE)?.to_str().ok()?;
    value.split(';').next().map(str::to_string)
}

pub fn location(response: &Response<Body>) -> Option<&str> {
    response.headers().get(header::LOCATION)?.to_str().ok()
}

pub fn assert_redirect(response: &Response<Body>, to: &str) {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(response), Some(to));
}

fn encode(image: DynamicImage) -> Vec<u8> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
    buf
}

/// PNG of a QR code carrying `payload`
pub fn qr_png(payload: &str) -> Vec<u8> {
    let code = QrCode::new(payload.as_bytes()).unwrap();
    let modules = code.width() as u32;
    let colors = code.to_colors();
    let (scale, quiet) = (8u32, 4u32);
    let side = (modules + 2 * quiet) * scale;

    let image = GrayImage::from_fn(side, side, |x, y| {
        let (mx, my) = (x / scale, y / scale);
        let inside = (quiet..quiet + modules).contains(&mx) && (quiet..quiet + modules).contains(&my);
        if inside && colors[((my - quiet) * modules + (mx - quiet)) as usize] == Color::Dark {
            Luma([0u8])
        } else {
            Luma([255u8])
        }
    });

    encode(DynamicImage::ImageLuma8(image))
}

/// PNG without any QR code
pub fn photo_png() -> Vec<u8> {
    let image = RgbImage::from_fn(240, 160, |x, y| Rgb([x as u8, y as u8, 200]));
    encode(DynamicImage::ImageRgb8(image))
}

pub fn file_exists(root: &Path, identifier: &str, name: &str) -> bool {
    root.join(identifier).join(name).is_file()
}
