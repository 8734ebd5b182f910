#![allow(dead_code)]

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};

use axum::{
    Router,
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, Request, StatusCode, header},
};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use serde_json::{Value, json};
use tower::ServiceExt;
use tourbook::{
    AppState, Config, CreatableResource, Migrator,
    auth::{jwt, password},
    email::MemoryMailer,
    models::{
        tour::{self, Tour, TourCreate},
        user::{self, Role},
    },
    routes,
};
use uuid::Uuid;

/// Peer address attached to every request.
pub const CLIENT: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 40_000);

pub const PASSWORD: &str = "pass1234";

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub mailer: Arc<MemoryMailer>,
}

pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// A fresh in-memory database per test, migrated with the application's
/// migrator.
pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to the test database");
    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    db
}

pub fn test_config() -> Config {
    Config {
        public_dir: std::env::temp_dir().join(format!("tourbook-test-{}", Uuid::new_v4())),
        ..Config::for_tests()
    }
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(test_config(), Arc::new(MemoryMailer::new())).await
}

pub async fn setup_test_app_with(config: Config, mailer: Arc<MemoryMailer>) -> TestApp {
    let db = setup_test_db().await;
    let state = AppState::new(db, config, mailer.clone());
    TestApp {
        app: routes::app(state.clone()),
        state,
        mailer,
    }
}

impl TestApp {
    pub fn db(&self) -> &DatabaseConnection {
        &self.state.db
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.send_from(CLIENT, request).await
    }

    /// Send `request` as if it came from `client`.
    pub async fn send_from(&self, client: SocketAddr, mut request: Request<Body>) -> Response {
        request.extensions_mut().insert(ConnectInfo(client));
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        Response {
            status,
            headers,
            body,
        }
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Response {
        self.request("GET", uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> Response {
        self.request("POST", uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> Response {
        self.request("PATCH", uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> Response {
        self.request("DELETE", uri, token, None).await
    }

    /// Insert an active user and sign a token for them.
    pub async fn create_user(&self, name: &str, email: &str, role: Role) -> (user::Model, String) {
        let hashed = password::hash(PASSWORD.to_string(), self.state.config.bcrypt_cost)
            .await
            .unwrap();
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            email: Set(email.to_string()),
            photo: Set(user::DEFAULT_PHOTO.to_string()),
            role: Set(role.to_string()),
            password: Set(hashed),
            password_changed_at: Set(None),
            password_reset_token: Set(None),
            password_reset_expires: Set(None),
            active: Set(true),
            created_at: Set(chrono::Utc::now()),
            version: Set(0),
        }
        .insert(self.db())
        .await
        .unwrap();
        let token = jwt::sign(model.id, &self.state.config).unwrap();
        (model, token)
    }

    /// Insert a tour straight into the database.
    pub async fn insert_tour(&self, body: Value) -> tour::Model {
        let create: TourCreate = serde_json::from_value(body).unwrap();
        Tour::create_active_model(create)
            .unwrap()
            .insert(self.db())
            .await
            .unwrap()
    }
}

pub fn tour_body(name: &str, duration: i32, difficulty: &str, price: f64) -> Value {
    json!({
        "name": name,
        "duration": duration,
        "maxGroupSize": 10,
        "difficulty": difficulty,
        "price": price,
        "summary": "Exploring the wilderness",
        "imageCover": "tour-cover.jpg"
    })
}

/// Minimal PNG image for upload tests.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let buffer = image::ImageBuffer::from_pixel(width, height, image::Rgb([10u8, 120, 60]));
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(buffer)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

pub const BOUNDARY: &str = "tourbook-boundary";

/// Encode `(field, file name, content type, bytes)` parts as multipart form
/// data. Text fields have no file name.
pub fn multipart_body(parts: &[(&str, Option<&str>, &str, Vec<u8>)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (field, file_name, content_type, bytes) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match file_name {
            Some(file_name) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
                     Content-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{field}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_request(method: &str, uri: &str, token: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Names of the documents in a list response, in order.
pub fn names(body: &Value) -> Vec<String> {
    body["data"]["docs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|doc| doc["name"].as_str().unwrap_or_default().to_string())
        .collect()
}
