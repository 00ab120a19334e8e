#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use romshelf_api::auth::jwt::{generate_access_token, JwtConfig};
use romshelf_api::config::ServerConfig;
use romshelf_api::router::build_app_router;
use romshelf_api::state::AppState;
use romshelf_core::catalog::memory::InMemoryCatalog;
use romshelf_core::catalog::{Platform, Rom, RomFile};
use romshelf_core::delivery::DeliveryMode;
use romshelf_core::layout::LibraryStructure;
use romshelf_core::scopes::{SCOPE_ROMS_READ, SCOPE_ROMS_WRITE};
use romshelf_core::types::DbId;

pub const PSX_PLATFORM_ID: DbId = 1;
/// Two-disc rom stored as `roms/psx/Game/`.
pub const MULTI_DISC_ROM_ID: DbId = 10;
pub const DISC_1_FILE_ID: DbId = 101;
pub const DISC_2_FILE_ID: DbId = 102;
/// Single-file rom stored as `roms/psx/Solo.bin`.
pub const SINGLE_ROM_ID: DbId = 20;
pub const SOLO_FILE_ID: DbId = 201;

pub const DISC_1: &str = "Game (Disc 1).bin";
pub const DISC_2: &str = "Game (Disc 2).bin";

const TEST_JWT_SECRET: &str = "integration-test-secret-long-enough";
const MULTIPART_BOUNDARY: &str = "romshelf-test-boundary";

/// A running app over temporary library and resources roots.
pub struct TestApp {
    pub app: Router,
    pub catalog: Arc<InMemoryCatalog>,
    pub config: ServerConfig,
    pub library: TempDir,
    pub resources: TempDir,
}

impl TestApp {
    pub fn library_path(&self) -> &Path {
        self.library.path()
    }

    pub fn resources_path(&self) -> &Path {
        self.resources.path()
    }
}

/// Build a test `ServerConfig` with safe defaults over the given roots.
pub fn test_config(library: &Path, resources: &Path, mode: DeliveryMode) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
            access_token_expiry_mins: 15,
        },
        library_base_path: library.to_path_buf(),
        resources_base_path: resources.to_path_buf(),
        library_structure: LibraryStructure::A,
        delivery_mode: mode,
        disable_download_auth: false,
    }
}

/// Seeded app in `mode` with download auth enforced.
pub fn build_test_app(mode: DeliveryMode) -> TestApp {
    build_test_app_with(mode, |_| {})
}

/// Seeded app whose configuration is adjusted by `configure` first.
pub fn build_test_app_with(
    mode: DeliveryMode,
    configure: impl FnOnce(&mut ServerConfig),
) -> TestApp {
    let library = TempDir::new().expect("library tempdir");
    let resources = TempDir::new().expect("resources tempdir");

    let mut config = test_config(library.path(), resources.path(), mode);
    configure(&mut config);

    let catalog = Arc::new(InMemoryCatalog::new());
    seed(&catalog, library.path());

    let state = AppState::new(catalog.clone(), config.clone());
    let app = build_app_router(state, &config);

    TestApp {
        app,
        catalog,
        config,
        library,
        resources,
    }
}

/// Platform `psx`, a two-disc rom and a single-file rom, with their files
/// written to disk. Each file holds its own name.
fn seed(catalog: &InMemoryCatalog, library: &Path) {
    catalog.insert_platform(Platform {
        id: PSX_PLATFORM_ID,
        slug: "psx".into(),
        fs_slug: "psx".into(),
        name: "PlayStation".into(),
        custom_name: None,
    });

    let game_dir = library.join("roms/psx/Game");
    std::fs::create_dir_all(&game_dir).unwrap();
    std::fs::write(game_dir.join(DISC_1), DISC_1).unwrap();
    std::fs::write(game_dir.join(DISC_2), DISC_2).unwrap();
    std::fs::write(library.join("roms/psx/Solo.bin"), "solo").unwrap();

    catalog.insert_rom(Rom {
        id: MULTI_DISC_ROM_ID,
        platform_id: PSX_PLATFORM_ID,
        name: Some("Game".into()),
        summary: None,
        fs_name: "Game".into(),
        fs_path: "roms/psx".into(),
        fs_name_no_tags: "Game".into(),
        fs_name_no_ext: "Game".into(),
        path_manual: None,
        files: vec![
            // Stored out of order on purpose; deliveries sort by name.
            rom_file(DISC_2_FILE_ID, MULTI_DISC_ROM_ID, DISC_2, "roms/psx/Game", Some("0badc0de")),
            rom_file(DISC_1_FILE_ID, MULTI_DISC_ROM_ID, DISC_1, "roms/psx/Game", None),
        ],
    });

    catalog.insert_rom(Rom {
        id: SINGLE_ROM_ID,
        platform_id: PSX_PLATFORM_ID,
        name: None,
        summary: None,
        fs_name: "Solo.bin".into(),
        fs_path: "roms/psx".into(),
        fs_name_no_tags: "Solo".into(),
        fs_name_no_ext: "Solo".into(),
        path_manual: None,
        files: vec![rom_file(SOLO_FILE_ID, SINGLE_ROM_ID, "Solo.bin", "roms/psx", None)],
    });
}

fn rom_file(id: DbId, rom_id: DbId, name: &str, dir: &str, crc: Option<&str>) -> RomFile {
    RomFile {
        id,
        rom_id,
        file_name: name.to_string(),
        file_path: dir.to_string(),
        file_size_bytes: name.len() as i64,
        crc_hash: crc.map(str::to_string),
    }
}

/// Bearer token carrying `scopes`.
pub fn token(config: &ServerConfig, scopes: &[&str]) -> String {
    generate_access_token(1, scopes, &config.jwt).expect("token generation should succeed")
}

pub fn read_token(config: &ServerConfig) -> String {
    token(config, &[SCOPE_ROMS_READ])
}

pub fn write_token(config: &ServerConfig) -> String {
    token(config, &[SCOPE_ROMS_READ, SCOPE_ROMS_WRITE])
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.expect("request should complete")
}

pub async fn get(app: Router, uri: &str, token: Option<&str>) -> Response<Body> {
    send(app, request(Method::GET, uri, token).body(Body::empty()).unwrap()).await
}

pub async fn head(app: Router, uri: &str, token: Option<&str>) -> Response<Body> {
    send(app, request(Method::HEAD, uri, token).body(Body::empty()).unwrap()).await
}

pub async fn send_json(
    app: Router,
    method: Method,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    let request = request(method, uri, Some(token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

/// POST a multipart body with one file field named `field`, plus `headers`.
pub async fn post_multipart(
    app: Router,
    uri: &str,
    token: &str,
    headers: &[(&str, &str)],
    field: &str,
    content: &[u8],
) -> Response<Body> {
    post_multipart_body(app, uri, token, headers, multipart_body(field, content)).await
}

/// POST an already encoded multipart `body`.
pub async fn post_multipart_body(
    app: Router,
    uri: &str,
    token: &str,
    headers: &[(&str, &str)],
    body: Vec<u8>,
) -> Response<Body> {
    let mut builder = request(Method::POST, uri, Some(token)).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
    );
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    send(app, builder.body(Body::from(body)).unwrap()).await
}

pub fn multipart_body(field: &str, content: &[u8]) -> Vec<u8> {
    let mut body = truncated_multipart_body(field, content);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    body
}

/// A multipart body whose file field stops after `content`, as if the
/// client went away mid-transfer.
pub fn truncated_multipart_body(field: &str, content: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{MULTIPART_BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"{field}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body
}

fn request(method: Method, uri: &str, token: Option<&str>) -> axum::http::request::Builder {
    let builder = Request::builder().method(method).uri(uri);
    match token {
        Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
        None => builder,
    }
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).expect("body should be JSON")
}

pub fn header_str<'a>(response: &'a Response<Body>, name: &str) -> &'a str {
    response
        .headers()
        .get(name)
        .unwrap_or_else(|| panic!("missing header {name}"))
        .to_str()
        .unwrap()
}
