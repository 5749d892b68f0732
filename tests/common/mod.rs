//! Common test utilities for E2E tests

use mingle::data::{EntityId, User};
use mingle::{AppState, auth, config};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Token secret shared between the test server and minted test tokens
pub const TOKEN_SECRET: &str = "test-secret-key-32-bytes-long!!!";

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                domain: "test.example.com".to_string(),
                protocol: "https".to_string(),
            },
            database: config::DatabaseConfig { path: db_path },
            auth: config::AuthConfig {
                token_secret: TOKEN_SECRET.to_string(),
                token_max_age: 604800,
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        // Initialize app state
        let state = AppState::new(config).await.unwrap();

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        // Build router
        let app = mingle::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait a bit for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Self {
            addr: addr_str,
            state,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Seed a user directly in the database
    pub async fn create_user(&self, name: &str) -> User {
        let now = chrono::Utc::now();
        let user = User {
            id: EntityId::new().0,
            full_name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            avatar: None,
            bio: None,
            created_at: now,
            updated_at: now,
        };
        self.state.db.insert_user(&user).await.unwrap();
        user
    }

    /// Mint an access token for a user with the shared test secret
    pub fn token_for(&self, user: &User) -> String {
        auth::create_access_token(&user.id, TOKEN_SECRET, 3600).unwrap()
    }

    /// Bearer header value for a user
    pub fn bearer(&self, user: &User) -> String {
        format!("Bearer {}", self.token_for(user))
    }
}
