use mongodb::{Client, Database, options::ClientOptions};
use safetrack_api::{
    build_router,
    state::{AppState, notification_sink},
};
use safetrack_config::Settings;
use safetrack_db::indexes::ensure_indexes;
use safetrack_services::{AuthService, notify::NotificationSink};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// A running test application with its own MongoDB database.
pub struct TestApp {
    pub addr: SocketAddr,
    pub base_url: String,
    pub db: Database,
    pub settings: Settings,
    pub client: reqwest::Client,
    pub auth: AuthService,
}

impl TestApp {
    /// Spawn a new test server connected to the test MongoDB.
    ///
    /// Requires a MongoDB replica set at localhost:27017 (action writes use
    /// transactions). Set SAFETRACK__DATABASE__URL to override the connection
    /// string. Each test gets a unique database name for isolation.
    pub async fn spawn() -> Self {
        Self::spawn_with_settings(|_| {}).await
    }

    /// Spawn a test server with customized settings.
    pub async fn spawn_with_settings(mutator: impl FnOnce(&mut Settings)) -> Self {
        Self::start(mutator, |db, settings| {
            notification_sink(db, settings).expect("Failed to build notification sink")
        })
        .await
    }

    /// Spawn a test server whose notifications go to the sink built by `make_sink`.
    pub async fn spawn_with_sink(
        make_sink: impl FnOnce(&Database) -> Arc<dyn NotificationSink>,
    ) -> Self {
        Self::start(|_| {}, |db, _| make_sink(db)).await
    }

    async fn start(
        mutator: impl FnOnce(&mut Settings),
        make_sink: impl FnOnce(&Database, &Settings) -> Arc<dyn NotificationSink>,
    ) -> Self {
        let db_name = format!("safetrack_test_{}", uuid::Uuid::new_v4().simple());

        let mut settings = Settings::load().unwrap_or_else(|_| test_settings());
        if let Ok(url) = std::env::var("SAFETRACK__DATABASE__URL") {
            settings.database.url = url;
        }
        settings.database.name = db_name.clone();
        mutator(&mut settings);

        let client_options = ClientOptions::parse(&settings.database.url)
            .await
            .expect("Failed to parse MongoDB URL");
        let mongo_client =
            Client::with_options(client_options).expect("Failed to create MongoDB client");
        let db = mongo_client.database(&db_name);

        ensure_indexes(&db).await.expect("Failed to create indexes");

        let sink = make_sink(&db, &settings);
        let app_state = AppState::with_sink(db.clone(), &settings, sink);
        let app = build_router(app_state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let base_url = format!("http://{}", addr);
        let client = reqwest::Client::builder()
            .build()
            .expect("Failed to build HTTP client");
        let auth = AuthService::new(settings.jwt.clone());

        Self {
            addr,
            base_url,
            db,
            settings,
            client,
            auth,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn auth_get(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .get(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    pub fn auth_post(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    pub fn auth_put(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .put(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let db = self.db.clone();
        // Best effort cleanup: drop the test database
        tokio::spawn(async move {
            let _ = db.drop().await;
        });
    }
}

fn test_settings() -> Settings {
    Settings {
        app: safetrack_config::AppSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec![],
        },
        database: safetrack_config::DatabaseSettings {
            url: "mongodb://localhost:27017/?replicaSet=rs0".to_string(),
            name: "safetrack_test".to_string(),
            max_pool_size: Some(5),
            min_pool_size: Some(1),
        },
        jwt: safetrack_config::JwtSettings {
            secret: "test-secret-key-for-jwt-signing-minimum-32-chars".to_string(),
            access_token_ttl_secs: 3600,
            issuer: "safetrack".to_string(),
        },
        notifications: safetrack_config::NotificationSettings { enabled: true },
        email: safetrack_config::EmailSettings {
            enabled: false,
            smtp_host: "localhost".to_string(),
            smtp_port: 25,
            smtp_username: None,
            smtp_password: None,
            starttls: false,
            from: "SafeTrack <no-reply@safetrack.test>".to_string(),
        },
    }
}
