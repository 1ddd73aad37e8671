//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum_test::TestServer;
use chrono::{TimeZone, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use tempfile::TempDir;

use sharebox::db::{NewUser, UserRepository};
use sharebox::web::handlers::AppState;
use sharebox::web::middleware::{JwtClaims, JwtState};
use sharebox::web::router::create_router;
use sharebox::{
    Database, FileService, FileServiceOptions, FileStorage, ManualClock, Reconciler,
    SweepScheduler, Sweeper,
};

pub const JWT_SECRET: &str = "test-secret-key-for-testing-only";
pub const BASE_URL: &str = "https://share.example.com";

/// A complete sqlite + on-disk deployment driven by a manual clock.
pub struct Harness {
    pub db: Arc<Database>,
    pub storage: Arc<FileStorage>,
    pub clock: ManualClock,
    pub service: Arc<FileService>,
    pub sweeper: Arc<Sweeper>,
    pub scheduler: Arc<SweepScheduler>,
    pub reconciler: Arc<Reconciler>,
    _dir: TempDir,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_options(FileServiceOptions {
            public_base_url: BASE_URL.to_string(),
            ..FileServiceOptions::default()
        })
        .await
    }

    pub async fn with_options(options: FileServiceOptions) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let db = Arc::new(
            Database::open_in_memory()
                .await
                .expect("Failed to create test database"),
        );
        let storage =
            Arc::new(FileStorage::new(dir.path().join("files")).expect("Failed to create storage"));
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
        let shared_clock = Arc::new(clock.clone());

        let service = Arc::new(FileService::with_database(
            &db,
            storage.clone(),
            shared_clock.clone(),
            options,
        ));
        let sweeper = Arc::new(Sweeper::new(
            service.metadata(),
            storage.clone(),
            shared_clock,
        ));
        let scheduler = Arc::new(SweepScheduler::new(
            sweeper.clone(),
            Duration::from_secs(3600),
        ));
        let reconciler = Arc::new(Reconciler::new(service.metadata(), storage.clone()));

        Self {
            db,
            storage,
            clock,
            service,
            sweeper,
            scheduler,
            reconciler,
            _dir: dir,
        }
    }

    /// Build an HTTP test server over this deployment.
    pub fn server(&self) -> TestServer {
        let app_state = Arc::new(AppState::new(
            self.service.clone(),
            self.scheduler.clone(),
            self.reconciler.clone(),
        ));
        let jwt_state = Arc::new(JwtState::new(JWT_SECRET));
        let router = create_router(app_state, jwt_state, &[]);
        TestServer::new(router).expect("Failed to create test server")
    }

    /// Create a user and return its id.
    pub async fn create_user(&self, username: &str) -> i64 {
        UserRepository::new(self.db.pool())
            .create(&NewUser::new(username))
            .await
            .expect("Failed to create user")
            .id
    }

    /// Advance the manual clock by whole hours.
    pub fn advance_hours(&self, hours: i64) {
        self.clock.advance(chrono::Duration::hours(hours));
    }
}

/// Issue a bearer token for `user_id`.
pub fn token_for(user_id: i64, username: &str, role: &str) -> String {
    let now = Utc::now().timestamp();
    let claims = JwtClaims {
        sub: user_id,
        username: username.to_string(),
        role: role.to_string(),
        iat: now as u64,
        exp: (now + 3600) as u64,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("Failed to encode token")
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}
