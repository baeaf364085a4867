#![allow(dead_code)]

use agora::config::Config;
use agora::db;
use agora::routes;
use agora::state::{AppState, DbPool};
use serde_json::{json, Value};
use tempfile::TempDir;

pub const PASSWORD: &str = "Str0ng!Password";

/// A live server on an ephemeral port backed by a throwaway database.
pub struct TestServer {
    pub base: String,
    pub pool: DbPool,
    _dir: TempDir,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    pub async fn start_with(configure: impl FnOnce(&mut Config)) -> Self {
        let dir = TempDir::new().unwrap();

        let mut config = Config::default();
        config.database.path = Some(dir.path().join("test.db"));
        config.storage.path = Some(dir.path().join("assets"));
        config.auth.bcrypt_cost = 4;
        configure(&mut config);

        let pool = db::create_pool(config.db_path()).expect("Failed to create test database");
        db::run_migrations(&pool).expect("Failed to run migrations");

        let app = routes::app(AppState::new(pool.clone(), config));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestServer {
            base: format!("http://{}", addr),
            pool,
            _dir: dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Rows in `table` matching `column = value`.
    pub fn count(&self, table: &str, column: &str, value: &str) -> i64 {
        let conn = self.pool.get().unwrap();
        conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE {} = ?1", table, column),
            rusqlite::params![value],
            |row| row.get(0),
        )
        .unwrap()
    }

    /// Registers a user on a fresh cookie-holding client and returns both.
    pub async fn user(&self, first_name: &str, email: &str) -> (reqwest::Client, Value) {
        let client = client();
        let resp = client
            .post(self.url("/register"))
            .json(&registration(first_name, email, PASSWORD))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201, "registration of {} failed", email);
        let body: Value = resp.json().await.unwrap();
        (client, body)
    }

    /// Creates a text post as the client's user and returns its id.
    pub async fn post(&self, client: &reqwest::Client, content: &str) -> String {
        let form = reqwest::multipart::Form::new().text("description", content.to_string());
        let resp = client
            .post(self.url("/posts"))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let posts: Value = resp.json().await.unwrap();
        posts
            .as_array()
            .unwrap()
            .iter()
            .find(|p| p["content"] == content)
            .map(|p| p["id"].as_str().unwrap().to_string())
            .unwrap()
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().cookie_store(true).build().unwrap()
}

pub fn registration(first_name: &str, email: &str, password: &str) -> Value {
    json!({
        "firstName": first_name,
        "lastName": "Tester",
        "email": email,
        "password": password,
        "confirmPassword": password,
    })
}

pub fn id_of(value: &Value) -> String {
    value["id"].as_str().unwrap().to_string()
}
