#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use openbrief::config::{BootstrapAdmin, Config, MailConfig, MailProvider, TokenConfig};
use openbrief::email::Mailer;
use openbrief::state::AppState;
use openbrief::storage::ObjectStore;

pub const ADMIN_EMAIL: &str = "admin@test.com";
pub const ADMIN_PASSWORD: &str = "Adm1n!pass";
pub const USER_PASSWORD: &str = "Us3r!pass";

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

/// Captures outgoing mail; can be switched to fail every send.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentEmail>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_to(&self, email: &str) -> Option<SentEmail> {
        self.sent()
            .into_iter()
            .rev()
            .find(|m| m.to.iter().any(|t| t == email))
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &[String], subject: &str, html: &str) -> Result<(), String> {
        if self.failing.load(Ordering::SeqCst) || to.iter().any(|t| t.ends_with("@bounce.test")) {
            return Err("mailbox unavailable".to_string());
        }
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_vec(),
            subject: subject.to_string(),
            html: html.to_string(),
        });
        Ok(())
    }
}

/// Hands out fake signed URLs and remembers deleted keys.
#[derive(Default)]
pub struct FakeObjectStore {
    pub deleted: Mutex<Vec<String>>,
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn upload_url(&self, key: &str) -> Result<String, String> {
        Ok(format!("https://bucket.test/{key}?X-Amz-Signature=put"))
    }

    async fn download_url(&self, key: &str) -> Result<String, String> {
        Ok(format!("https://bucket.test/{key}?X-Amz-Signature=get"))
    }

    async fn delete(&self, key: &str) -> Result<(), String> {
        self.deleted.lock().unwrap().push(key.to_string());
        Ok(())
    }
}

/// Pull the 6-digit code out of an email body.
pub fn extract_otp(html: &str) -> String {
    let re = Regex::new(r"<strong>(\d{6})</strong>").unwrap();
    re.captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .expect("email contains no OTP")
}

/// A running test server instance with a dedicated test database.
pub struct TestApp {
    pub addr: SocketAddr,
    pub pool: PgPool,
    pub client: Client,
    pub db_name: String,
    pub mailer: Arc<RecordingMailer>,
    pub storage: Arc<FakeObjectStore>,
}

pub struct Options {
    pub storage: bool,
    pub client_url: Option<String>,
    pub max_body_size: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            storage: true,
            client_url: Some("http://localhost:3000".to_string()),
            max_body_size: 1_048_576,
        }
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Send a request with an optional bearer token and JSON body.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> Response {
        let mut req = self.client.request(method, self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        req.send().await.expect("request failed")
    }

    pub async fn call(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> (Value, StatusCode) {
        let resp = self.send(method, path, token, body).await;
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn login(&self, email: &str, password: &str) -> (Value, StatusCode) {
        self.call(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(&json!({ "email": email, "password": password })),
        )
        .await
    }

    /// Log in and return the access token.
    pub async fn token_for(&self, email: &str, password: &str) -> String {
        let (body, status) = self.login(email, password).await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["data"]["docs"]["accessToken"].as_str().unwrap().to_string()
    }

    pub async fn admin_token(&self) -> String {
        self.token_for(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    /// Register a regular user through the public route.
    pub async fn register_user(&self, email: &str, name: &str) -> (Value, StatusCode) {
        self.call(
            Method::POST,
            "/api/v1/user/register/user",
            None,
            Some(&json!({ "email": email, "name": name, "password": USER_PASSWORD })),
        )
        .await
    }

    /// Register a regular user and return their id.
    pub async fn create_user(&self, email: &str, name: &str) -> Uuid {
        let (body, status) = self.register_user(email, name).await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        self.user_id(email).await
    }

    pub async fn user_id(&self, email: &str) -> Uuid {
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE email = $1")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .expect("user not found")
    }

    pub async fn role_id(&self, role: &str) -> Uuid {
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM roles WHERE role = $1")
            .bind(role)
            .fetch_one(&self.pool)
            .await
            .expect("role not found")
    }

    pub async fn get_auth(&self, path: &str, token: &str) -> (Value, StatusCode) {
        self.call(Method::GET, path, Some(token), None).await
    }

    pub async fn post_auth(&self, path: &str, token: &str, body: &Value) -> (Value, StatusCode) {
        self.call(Method::POST, path, Some(token), Some(body)).await
    }

    pub async fn patch_auth(&self, path: &str, token: &str, body: &Value) -> (Value, StatusCode) {
        self.call(Method::PATCH, path, Some(token), Some(body)).await
    }

    pub async fn delete_auth(&self, path: &str, token: &str, body: &Value) -> (Value, StatusCode) {
        self.call(Method::DELETE, path, Some(token), Some(body)).await
    }
}

/// `Set-Cookie` headers of a response.
pub fn set_cookies(resp: &Response) -> Vec<String> {
    resp.headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// Value of the named cookie among `Set-Cookie` headers.
pub fn cookie_value(cookies: &[String], name: &str) -> Option<String> {
    cookies.iter().find_map(|c| {
        let pair = c.split(';').next()?;
        let (k, v) = pair.split_once('=')?;
        (k.trim() == name).then(|| v.trim().to_string())
    })
}

fn admin_url(base_url: &str) -> String {
    base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/postgres"))
        .unwrap_or_else(|| base_url.to_string())
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(Options::default()).await
}

/// Spawn a test app with a fresh temporary database and a bootstrap admin.
pub async fn spawn_app_with(options: Options) -> TestApp {
    let _ = dotenvy::dotenv();

    let base_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let db_name = format!("openbrief_test_{}", Uuid::now_v7().to_string().replace('-', ""));

    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url(&base_url))
        .await
        .expect("Failed to connect to postgres for test DB creation");

    sqlx::query(&format!("CREATE DATABASE \"{db_name}\""))
        .execute(&admin_pool)
        .await
        .expect("Failed to create test database");

    admin_pool.close().await;

    let test_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/{db_name}"))
        .unwrap_or_else(|| base_url.clone());

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&test_url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations on test database");

    let bootstrap_admin = BootstrapAdmin {
        email: ADMIN_EMAIL.to_string(),
        password: ADMIN_PASSWORD.to_string(),
        name: "Admin".to_string(),
    };
    openbrief::bootstrap::ensure_admin(&pool, &bootstrap_admin)
        .await
        .expect("Failed to create bootstrap admin");

    let config = Config {
        database_url: test_url,
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        server_url: "http://localhost:0".to_string(),
        client_url: options.client_url,
        access_token: TokenConfig {
            secret: "test-access-secret-that-is-long-enough".to_string(),
            expiry_secs: 3600,
        },
        refresh_token_expiry_secs: 86400,
        max_body_size: options.max_body_size,
        log_level: "warn".to_string(),
        mail: MailConfig {
            sender_name: "OpenBrief".to_string(),
            sender_email: "no-reply@test.com".to_string(),
            provider: MailProvider::Log,
        },
        s3: None,
        bootstrap_admin: Some(bootstrap_admin),
    };

    let mailer = Arc::new(RecordingMailer::default());
    let storage = Arc::new(FakeObjectStore::default());
    let store: Option<Arc<dyn ObjectStore>> = if options.storage {
        Some(storage.clone() as Arc<dyn ObjectStore>)
    } else {
        None
    };

    let state = Arc::new(AppState::new(pool.clone(), config, mailer.clone(), store));
    let app = openbrief::build_app(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        addr,
        pool,
        client,
        db_name,
        mailer,
        storage,
    }
}

/// Drop the test database after tests complete.
pub async fn cleanup(app: TestApp) {
    let db_name = app.db_name.clone();
    app.pool.close().await;

    let base_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url(&base_url))
        .await
        .expect("Failed to connect for cleanup");

    let _ = sqlx::query(&format!("DROP DATABASE IF EXISTS \"{db_name}\" WITH (FORCE)"))
        .execute(&admin_pool)
        .await;

    admin_pool.close().await;
}
