use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use actix_web::{test, web, App};
use secrecy::Secret;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use fintrack_be::notification::{LoggingDispatcher, NotificationDispatcher};
use fintrack_be::{auth, budget, category, transaction, user};

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

static JWT_SECRET: &str = "test_jwt_secret_for_integration_tests";

pub struct TestApp {
    pub pool: PgPool,
    pub test_id: String,
}

pub struct TestResponse {
    status: u16,
    body: bytes::Bytes,
}

impl TestResponse {
    pub fn status(&self) -> u16 {
        self.status
    }

    pub async fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("Failed to parse JSON response")
    }
}

/// Build the full application for one test request.
macro_rules! test_app {
    ($pool:expr) => {{
        let jwt_secret = Secret::new(JWT_SECRET.to_string());
        let dispatcher: Arc<dyn NotificationDispatcher> = Arc::new(LoggingDispatcher);
        test::init_service(
            App::new()
                .app_data(web::Data::new($pool.clone()))
                .app_data(web::Data::new(jwt_secret))
                .app_data(web::Data::new(dispatcher))
                .service(auth::register)
                .service(auth::login)
                .service(auth::verify_email)
                .service(auth::forgot_password)
                .service(auth::reset_password)
                .service(auth::me)
                .service(user::update_me)
                .service(category::list_categories)
                .service(category::create_category)
                .service(category::get_category)
                .service(category::update_category)
                .service(category::delete_category)
                .service(budget::list_budgets)
                .service(budget::create_budget)
                .service(budget::get_budget)
                .service(budget::update_budget)
                .service(budget::delete_budget)
                .service(transaction::list_transactions)
                .service(transaction::create_transaction)
                .service(transaction::get_transaction)
                .service(transaction::update_transaction)
                .service(transaction::delete_transaction),
        )
        .await
    }};
}

impl TestApp {
    /// Connect to the integration database. Returns None (test skipped) when
    /// DATABASE_URL is not configured in the environment.
    pub async fn spawn() -> Option<Self> {
        let database_url = match std::env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                eprintln!("DATABASE_URL not set; skipping integration test");
                return None;
            }
        };

        let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let test_id = format!("{timestamp}_{counter}");

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await
            .expect("Failed to connect to database for tests");

        sqlx::migrate!()
            .run(&pool)
            .await
            .expect("Failed to run migrations for tests");

        Some(TestApp { pool, test_id })
    }

    /// Generate a unique email for this test run
    pub fn unique_email(&self, prefix: &str) -> String {
        format!("{prefix}_{}_@test.com", self.test_id)
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        let app = test_app!(self.pool);
        let mut req = test::TestRequest::get().uri(path);
        if let Some(token) = token {
            req = req.insert_header(("Authorization", format!("Bearer {token}")));
        }
        let resp = test::call_service(&app, req.to_request()).await;

        let status = resp.status().as_u16();
        let body = test::read_body(resp).await;
        TestResponse { status, body }
    }

    pub async fn post(&self, path: &str, payload: &Value, token: Option<&str>) -> TestResponse {
        let app = test_app!(self.pool);
        let mut req = test::TestRequest::post().uri(path).set_json(payload);
        if let Some(token) = token {
            req = req.insert_header(("Authorization", format!("Bearer {token}")));
        }
        let resp = test::call_service(&app, req.to_request()).await;

        let status = resp.status().as_u16();
        let body = test::read_body(resp).await;
        TestResponse { status, body }
    }

    pub async fn put(&self, path: &str, payload: &Value, token: Option<&str>) -> TestResponse {
        let app = test_app!(self.pool);
        let mut req = test::TestRequest::put().uri(path).set_json(payload);
        if let Some(token) = token {
            req = req.insert_header(("Authorization", format!("Bearer {token}")));
        }
        let resp = test::call_service(&app, req.to_request()).await;

        let status = resp.status().as_u16();
        let body = test::read_body(resp).await;
        TestResponse { status, body }
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> TestResponse {
        let app = test_app!(self.pool);
        let mut req = test::TestRequest::delete().uri(path);
        if let Some(token) = token {
            req = req.insert_header(("Authorization", format!("Bearer {token}")));
        }
        let resp = test::call_service(&app, req.to_request()).await;

        let status = resp.status().as_u16();
        let body = test::read_body(resp).await;
        TestResponse { status, body }
    }

    /// Register a user, mark them verified directly in the store, and log in.
    /// Returns the bearer token.
    pub async fn register_verified_user(&self, prefix: &str) -> String {
        let email = self.unique_email(prefix);
        let payload = serde_json::json!({
            "email": email,
            "password": "Password123",
            "fullName": "Test User"
        });

        let response = self.post("/auth/register", &payload, None).await;
        assert_eq!(response.status(), 201, "registration should succeed");

        // Verification normally happens through the emailed token; tests
        // flip the flag directly.
        sqlx::query("UPDATE users SET is_verified = TRUE WHERE email = $1")
            .bind(&email)
            .execute(&self.pool)
            .await
            .expect("Failed to mark user verified");

        let login_payload = serde_json::json!({
            "email": email,
            "password": "Password123"
        });
        let response = self.post("/auth/login", &login_payload, None).await;
        assert_eq!(response.status(), 200, "login should succeed");

        let body = response.json().await;
        body["token"].as_str().expect("token in response").to_string()
    }

    /// Create a category through the API and return its id.
    pub async fn create_category(&self, token: &str, name: &str, category_type: &str) -> String {
        let payload = serde_json::json!({
            "name": format!("{name} {}", self.test_id),
            "categoryType": category_type
        });
        let response = self.post("/categories", &payload, Some(token)).await;
        assert_eq!(response.status(), 201, "category creation should succeed");

        let body = response.json().await;
        body["id"].as_str().expect("category id").to_string()
    }

    /// Create a budget through the API and return its id.
    pub async fn create_budget(&self, token: &str, category_id: Option<&str>) -> String {
        let payload = serde_json::json!({
            "categoryId": category_id,
            "budgetAmount": "1000",
            "startDate": "2026-01-01",
            "endDate": "2026-12-31",
            "note": "test budget"
        });
        let response = self.post("/budgets", &payload, Some(token)).await;
        assert_eq!(response.status(), 201, "budget creation should succeed");

        let body = response.json().await;
        body["id"].as_str().expect("budget id").to_string()
    }

    /// Read a budget's current spend amount straight from the store.
    pub async fn budget_spend(&self, budget_id: &str) -> String {
        let spend: rust_decimal::Decimal =
            sqlx::query_scalar("SELECT spend_amount FROM budgets WHERE id = $1::uuid")
                .bind(budget_id)
                .fetch_one(&self.pool)
                .await
                .expect("Failed to read budget spend");
        spend.normalize().to_string()
    }
}
