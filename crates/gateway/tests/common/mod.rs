#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! This module provides test infrastructure that uses the REAL gateway code,
//! not mock implementations. A single [`TestApp`] instance is shared across
//! all tests via [`shared_app`].
//!
//! ## Runtime Safety
//!
//! The shared `TestApp` is initialized on a long-lived, multi-threaded Tokio
//! runtime that outlives any individual test runtime. This prevents errors
//! from pool connections being dropped when the initializing test's runtime
//! shuts down.

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, header};
use axum::response::Response;
use sqlx::PgPool;
use tower::ServiceExt;

use scrivano_gateway::models::Setting;
use scrivano_gateway::state::AppState;
use scrivano_gateway::{config::Config, secret};

/// The API key every authenticated test sends.
///
/// `TestApp::new` writes it into settings; tests that rotate the key must
/// restore it before finishing (see the key lock in the test file).
pub const TEST_API_KEY: &str = "test-gateway-key-0123456789abcdef";

/// Shared Tokio runtime that outlives all individual test runtimes.
///
/// PgPool and Redis connections need an active I/O driver. By keeping this
/// runtime alive for the entire test binary, the shared `TestApp`'s
/// connections remain valid across all tests.
pub static SHARED_RT: std::sync::LazyLock<tokio::runtime::Runtime> =
    std::sync::LazyLock::new(|| {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("Failed to build shared test runtime")
    });

/// Global shared test app, initialized once on the shared runtime and
/// reused by every test.
static SHARED_APP: std::sync::OnceLock<TestApp> = std::sync::OnceLock::new();

/// Get a reference to the shared [`TestApp`].
pub async fn shared_app() -> &'static TestApp {
    SHARED_APP.get_or_init(|| {
        // Use the shared runtime's handle to initialize inside a
        // separate OS thread (avoiding nested block_on).
        let handle = SHARED_RT.handle().clone();
        std::thread::spawn(move || handle.block_on(TestApp::new()))
            .join()
            .expect("TestApp init thread panicked")
    })
}

/// Run an async test body on [`SHARED_RT`].
///
/// Using a single runtime for all tests prevents pool connections opened on
/// one per-test runtime from going stale when that runtime shuts down.
pub fn run_test<F: std::future::Future<Output = ()> + Send>(f: F) {
    SHARED_RT.block_on(f);
}

/// Test application wrapper using the REAL gateway routes and state.
pub struct TestApp {
    router: Router,
    pub db: PgPool,
    pub state: AppState,
}

impl TestApp {
    /// Create a new test application with full gateway initialization.
    pub async fn new() -> Self {
        // Load test environment
        dotenvy::dotenv().ok();

        if std::env::var("UPLOADS_DIR").is_err() {
            let uploads_dir = std::env::temp_dir().join("scrivano-test-uploads");
            // SAFETY: We're setting the environment variable before spawning threads
            unsafe { std::env::set_var("UPLOADS_DIR", uploads_dir) };
        }

        // Point the public URL at a port nothing listens on, so the
        // connection self-test fails fast and deterministically.
        if std::env::var("SITE_URL").is_err() {
            unsafe { std::env::set_var("SITE_URL", "http://127.0.0.1:1") };
        }

        // Tests run concurrently; bump the default pool size so slow
        // queries don't starve other tests of connections.
        if std::env::var("DATABASE_MAX_CONNECTIONS").is_err() {
            unsafe { std::env::set_var("DATABASE_MAX_CONNECTIONS", "25") };
        }

        let config = Config::from_env().expect("Failed to load config");

        // Initialize the REAL AppState (database, redis, migrations, etc.)
        let state = AppState::new(&config)
            .await
            .expect("Failed to initialize AppState");

        let db = state.db().clone();

        // Pin the API key to a known value for authenticated requests.
        Setting::set_string(&db, secret::SECRET_KEY, TEST_API_KEY)
            .await
            .expect("Failed to set test API key");

        let session_layer = scrivano_gateway::session::create_session_layer(
            &config.redis_url,
            tower_sessions::cookie::SameSite::Strict,
        )
        .await
        .expect("Failed to create session layer");

        // Build the REAL router with all gateway routes (must match main.rs)
        let router = Router::new()
            .merge(scrivano_gateway::routes::router(&state))
            .layer(session_layer)
            .layer(tower_http::trace::TraceLayer::new_for_http())
            .with_state(state.clone());

        // Pre-warm all pool connections on SHARED_RT so that no connection
        // is ever first created on a per-test runtime.
        {
            let mut conns = Vec::new();
            for _ in 0..config.database_max_connections {
                if let Ok(c) = db.acquire().await {
                    conns.push(c);
                }
            }
            drop(conns);
        }

        Self { router, db, state }
    }

    /// Send a request to the test application.
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    /// Send a request with cookies from a previous response.
    pub async fn request_with_cookies(
        &self,
        mut request: Request<Body>,
        cookies: &str,
    ) -> Response {
        if !cookies.is_empty() {
            request.headers_mut().insert(
                header::COOKIE,
                cookies.parse().expect("Invalid cookie header"),
            );
        }
        self.request(request).await
    }

    /// Login via the JSON API and return session cookies.
    ///
    /// # Panics
    ///
    /// Panics if the login response is not 200 OK.
    pub async fn login(&self, username: &str, password: &str) -> String {
        // Clear any failed attempts left behind by earlier runs.
        self.state.lockout().clear_attempts(username).await.ok();

        let response = self
            .request(
                Request::post("/user/login")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({
                            "username": username,
                            "password": password
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await;

        assert_eq!(
            response.status(),
            axum::http::StatusCode::OK,
            "Login failed for user '{username}' (status {})",
            response.status()
        );

        extract_cookies(&response)
    }

    /// Create a test admin user and return session cookies after logging in.
    pub async fn create_and_login_admin(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> String {
        self.create_test_admin(username, password, email).await;
        self.login(username, password).await
    }

    /// Create a test admin user directly in the database.
    pub async fn create_test_admin(&self, username: &str, password: &str, email: &str) -> i64 {
        self.create_test_user_inner(username, password, email, &["administrator"])
            .await
    }

    /// Create a test author directly in the database.
    pub async fn create_test_author(&self, username: &str, password: &str, email: &str) -> i64 {
        self.create_test_user_inner(username, password, email, &["author"])
            .await
    }

    /// Create a test user with no publishing role.
    pub async fn create_test_user(&self, username: &str, password: &str, email: &str) -> i64 {
        self.create_test_user_inner(username, password, email, &[])
            .await
    }

    async fn create_test_user_inner(
        &self,
        username: &str,
        password: &str,
        email: &str,
        roles: &[&str],
    ) -> i64 {
        use argon2::{
            Argon2,
            password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
        };

        // Use minimal Argon2 params for test speed; production params are
        // too slow for dozens of test users.
        let password = password.to_owned();
        let password_hash = tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            let params = argon2::Params::new(
                4 * 1024, // 4 MiB
                1,        // 1 iteration
                1,        // 1 lane
                None,
            )
            .expect("test Argon2 params are valid");
            let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);
            argon2
                .hash_password(password.as_bytes(), &salt)
                .expect("Failed to hash password")
                .to_string()
        })
        .await
        .expect("Argon2 hashing task panicked");

        let user_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO users (name, pass, mail, display_name)
            VALUES ($1, $2, $3, $1)
            ON CONFLICT ((LOWER(name))) DO UPDATE SET pass = $2, mail = $3
            RETURNING id
            "#,
        )
        .bind(username)
        .bind(&password_hash)
        .bind(email)
        .fetch_one(&self.db)
        .await
        .expect("Failed to create test user");

        for role in roles {
            sqlx::query(
                "INSERT INTO user_roles (user_id, role) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(user_id)
            .bind(role)
            .execute(&self.db)
            .await
            .expect("Failed to assign test role");
        }

        user_id
    }
}

/// Extract Set-Cookie headers from a response for use in subsequent requests.
pub fn extract_cookies(response: &Response) -> String {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|cookie| {
            // Keep just the cookie name=value, dropping attributes
            cookie.split(';').next()
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// A short unique suffix for names created by a test.
pub fn unique_suffix() -> String {
    hex::encode(rand::random::<[u8; 6]>())
}
