use serde_json::{json, Value};

mod common;
use common::TestApp;

// ============================================================================
// Auth flow
// ============================================================================

#[actix_rt::test]
async fn test_register_success() {
    let Some(app) = TestApp::spawn().await else { return };
    let email = app.unique_email("newuser");

    let payload = json!({
        "email": email,
        "password": "Password123",
        "fullName": "New User"
    });

    let response = app.post("/auth/register", &payload, None).await;

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await;
    assert_eq!(body["email"], email);
    assert_eq!(body["fullName"], "New User");
    assert_eq!(body["isVerified"], false);
}

#[actix_rt::test]
async fn test_register_duplicate_email() {
    let Some(app) = TestApp::spawn().await else { return };
    let email = app.unique_email("duplicate");

    let payload = json!({
        "email": email,
        "password": "Password123"
    });

    let response1 = app.post("/auth/register", &payload, None).await;
    assert_eq!(response1.status(), 201);

    let response2 = app.post("/auth/register", &payload, None).await;
    assert_eq!(response2.status(), 409);
    let body: Value = response2.json().await;
    assert_eq!(body["error"], "CONFLICT");
}

#[actix_rt::test]
async fn test_register_invalid_email() {
    let Some(app) = TestApp::spawn().await else { return };

    let payload = json!({
        "email": "not-an-email",
        "password": "Password123"
    });

    let response = app.post("/auth/register", &payload, None).await;

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await;
    assert_eq!(body["error"], "VALIDATION_ERROR");
}

#[actix_rt::test]
async fn test_register_weak_password() {
    let Some(app) = TestApp::spawn().await else { return };
    let email = app.unique_email("weakpass");

    // No uppercase, no digit
    let payload = json!({
        "email": email,
        "password": "alllowercase"
    });

    let response = app.post("/auth/register", &payload, None).await;

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await;
    assert_eq!(body["error"], "VALIDATION_ERROR");
}

#[actix_rt::test]
async fn test_login_rejected_until_verified() {
    let Some(app) = TestApp::spawn().await else { return };
    let email = app.unique_email("unverified");

    let payload = json!({
        "email": email,
        "password": "Password123"
    });
    app.post("/auth/register", &payload, None).await;

    let response = app.post("/auth/login", &payload, None).await;

    assert_eq!(response.status(), 401);
    let body: Value = response.json().await;
    assert_eq!(body["error"], "UNAUTHORIZED");
}

#[actix_rt::test]
async fn test_login_wrong_password() {
    let Some(app) = TestApp::spawn().await else { return };
    let token = app.register_verified_user("wrongpass").await;
    assert!(!token.is_empty());

    // register_verified_user used a unique email; attack it with a bad password
    let response = app
        .post(
            "/auth/login",
            &json!({
                "email": app.unique_email("wrongpass"),
                "password": "WrongPassword1"
            }),
            None,
        )
        .await;

    assert_eq!(response.status(), 401);
}

#[actix_rt::test]
async fn test_me_requires_token() {
    let Some(app) = TestApp::spawn().await else { return };

    let response = app.get("/auth/me", None).await;
    assert_eq!(response.status(), 401);

    let token = app.register_verified_user("me").await;
    let response = app.get("/auth/me", Some(&token)).await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await;
    assert_eq!(body["isVerified"], true);
}

// ============================================================================
// Categories
// ============================================================================

#[actix_rt::test]
async fn test_category_crud_and_duplicate_name() {
    let Some(app) = TestApp::spawn().await else { return };
    let token = app.register_verified_user("catcrud").await;

    let name = format!("Groceries {}", app.test_id);
    let payload = json!({ "name": name, "categoryType": "expense" });

    let response = app.post("/categories", &payload, Some(&token)).await;
    assert_eq!(response.status(), 201);
    let created: Value = response.json().await;
    let category_id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["categoryType"], "expense");
    assert_eq!(created["isDefault"], false);

    // Same name, different case: rejected within the user's own set
    let dup_payload = json!({ "name": name.to_uppercase(), "categoryType": "expense" });
    let response = app.post("/categories", &dup_payload, Some(&token)).await;
    assert_eq!(response.status(), 409);

    let response = app
        .get(&format!("/categories/{category_id}"), Some(&token))
        .await;
    assert_eq!(response.status(), 200);

    let response = app
        .delete(&format!("/categories/{category_id}"), Some(&token))
        .await;
    assert_eq!(response.status(), 204);
}

#[actix_rt::test]
async fn test_category_ownership_is_enforced() {
    let Some(app) = TestApp::spawn().await else { return };
    let owner_token = app.register_verified_user("catowner").await;
    let intruder_token = app.register_verified_user("catintruder").await;

    let category_id = app.create_category(&owner_token, "Private", "expense").await;

    let response = app
        .get(&format!("/categories/{category_id}"), Some(&intruder_token))
        .await;
    assert_eq!(response.status(), 401);

    let response = app
        .delete(&format!("/categories/{category_id}"), Some(&intruder_token))
        .await;
    assert_eq!(response.status(), 401);
}

// ============================================================================
// Budgets
// ============================================================================

#[actix_rt::test]
async fn test_budget_rejects_income_category() {
    let Some(app) = TestApp::spawn().await else { return };
    let token = app.register_verified_user("budincome").await;

    let income_id = app.create_category(&token, "Bonus", "income").await;

    let payload = json!({
        "categoryId": income_id,
        "budgetAmount": "500",
        "startDate": "2026-01-01",
        "endDate": "2026-12-31"
    });
    let response = app.post("/budgets", &payload, Some(&token)).await;

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await;
    assert_eq!(body["error"], "VALIDATION_ERROR");
}

#[actix_rt::test]
async fn test_budget_status_derivation_on_read() {
    let Some(app) = TestApp::spawn().await else { return };
    let token = app.register_verified_user("budstatus").await;

    let expense_id = app.create_category(&token, "Dining", "expense").await;
    let budget_id = app.create_budget(&token, Some(&expense_id)).await;

    // Fresh budget: 0 spend, on track
    let response = app.get(&format!("/budgets/{budget_id}"), Some(&token)).await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await;
    assert_eq!(body["status"], "ON_TRACK");
    let pct: rust_decimal::Decimal = body["percentUsed"].as_str().unwrap().parse().unwrap();
    assert_eq!(pct, rust_decimal::Decimal::ZERO);

    // Spend 850 of 1000 → 85% → nearing limit
    let txn = json!({
        "categoryId": expense_id,
        "budgetId": budget_id,
        "amount": "850",
        "transactionDate": "2026-03-10",
        "description": "dinner series"
    });
    let response = app.post("/transactions", &txn, Some(&token)).await;
    assert_eq!(response.status(), 201);

    let response = app.get(&format!("/budgets/{budget_id}"), Some(&token)).await;
    let body: Value = response.json().await;
    assert_eq!(body["status"], "NEARING_LIMIT");
    let pct: rust_decimal::Decimal = body["percentUsed"].as_str().unwrap().parse().unwrap();
    assert_eq!(pct, rust_decimal::Decimal::from(85));

    // Another 300 → 1150 of 1000 → exceeded
    let txn = json!({
        "categoryId": expense_id,
        "budgetId": budget_id,
        "amount": "300",
        "transactionDate": "2026-03-11"
    });
    app.post("/transactions", &txn, Some(&token)).await;

    let response = app.get(&format!("/budgets/{budget_id}"), Some(&token)).await;
    let body: Value = response.json().await;
    assert_eq!(body["status"], "EXCEEDED");
}

// ============================================================================
// Transaction lifecycle and ledger reconciliation
// ============================================================================

#[actix_rt::test]
async fn test_expense_requires_budget_before_persisting() {
    let Some(app) = TestApp::spawn().await else { return };
    let token = app.register_verified_user("nobudget").await;

    let expense_id = app.create_category(&token, "Fuel", "expense").await;

    let payload = json!({
        "categoryId": expense_id,
        "amount": "40",
        "transactionDate": "2026-02-01"
    });
    let response = app.post("/transactions", &payload, Some(&token)).await;

    assert_eq!(response.status(), 400);

    // Nothing was persisted
    let response = app.get("/transactions", Some(&token)).await;
    let body: Value = response.json().await;
    assert_eq!(body["total"], 0);
}

#[actix_rt::test]
async fn test_income_transaction_never_touches_budgets() {
    let Some(app) = TestApp::spawn().await else { return };
    let token = app.register_verified_user("incometxn").await;

    let income_id = app.create_category(&token, "Wages", "income").await;
    let expense_id = app.create_category(&token, "Rent", "expense").await;
    let budget_id = app.create_budget(&token, Some(&expense_id)).await;

    let payload = json!({
        "categoryId": income_id,
        "amount": "2500",
        "transactionDate": "2026-02-01"
    });
    let response = app.post("/transactions", &payload, Some(&token)).await;
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await;
    assert!(body["budgetId"].is_null());

    assert_eq!(app.budget_spend(&budget_id).await, "0");
}

#[actix_rt::test]
async fn test_ledger_create_amend_move_delete_sequence() {
    let Some(app) = TestApp::spawn().await else { return };
    let token = app.register_verified_user("ledger").await;

    let expense_id = app.create_category(&token, "Shopping", "expense").await;
    let budget_x = app.create_budget(&token, Some(&expense_id)).await;
    let budget_y = app.create_budget(&token, None).await;

    // Create: X.spend == 120
    let payload = json!({
        "categoryId": expense_id,
        "budgetId": budget_x,
        "amount": "120",
        "transactionDate": "2026-04-01",
        "description": "new shoes"
    });
    let response = app.post("/transactions", &payload, Some(&token)).await;
    assert_eq!(response.status(), 201);
    let txn: Value = response.json().await;
    let txn_id = txn["id"].as_str().unwrap().to_string();

    assert_eq!(app.budget_spend(&budget_x).await, "120");

    // Amend amount 120 → 80 (same category, same budget): X.spend == 80, not 200
    let payload = json!({
        "categoryId": expense_id,
        "budgetId": budget_x,
        "amount": "80",
        "transactionDate": "2026-04-01",
        "description": "returned one pair"
    });
    let response = app
        .put(&format!("/transactions/{txn_id}"), &payload, Some(&token))
        .await;
    assert_eq!(response.status(), 200);

    assert_eq!(app.budget_spend(&budget_x).await, "80");

    // Move X → Y: X.spend == 0, Y.spend == 80
    let payload = json!({
        "categoryId": expense_id,
        "budgetId": budget_y,
        "amount": "80",
        "transactionDate": "2026-04-01"
    });
    let response = app
        .put(&format!("/transactions/{txn_id}"), &payload, Some(&token))
        .await;
    assert_eq!(response.status(), 200);

    assert_eq!(app.budget_spend(&budget_x).await, "0");
    assert_eq!(app.budget_spend(&budget_y).await, "80");

    // Delete: Y.spend == 0
    let response = app
        .delete(&format!("/transactions/{txn_id}"), Some(&token))
        .await;
    assert_eq!(response.status(), 204);

    assert_eq!(app.budget_spend(&budget_y).await, "0");
}

#[actix_rt::test]
async fn test_type_change_rejected_and_nothing_mutated() {
    let Some(app) = TestApp::spawn().await else { return };
    let token = app.register_verified_user("typechange").await;

    let expense_id = app.create_category(&token, "Utilities", "expense").await;
    let income_id = app.create_category(&token, "Refunds", "income").await;
    let budget_id = app.create_budget(&token, Some(&expense_id)).await;

    let payload = json!({
        "categoryId": expense_id,
        "budgetId": budget_id,
        "amount": "60",
        "transactionDate": "2026-05-01"
    });
    let response = app.post("/transactions", &payload, Some(&token)).await;
    let txn: Value = response.json().await;
    let txn_id = txn["id"].as_str().unwrap().to_string();

    assert_eq!(app.budget_spend(&budget_id).await, "60");

    // Attempt EXPENSE → INCOME flip
    let payload = json!({
        "categoryId": income_id,
        "amount": "60",
        "transactionDate": "2026-05-01"
    });
    let response = app
        .put(&format!("/transactions/{txn_id}"), &payload, Some(&token))
        .await;

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await;
    assert_eq!(body["error"], "VALIDATION_ERROR");

    // Transaction untouched, budget untouched
    let response = app
        .get(&format!("/transactions/{txn_id}"), Some(&token))
        .await;
    let body: Value = response.json().await;
    assert_eq!(body["categoryId"], expense_id.as_str());
    assert_eq!(body["amount"], "60.00");
    assert_eq!(app.budget_spend(&budget_id).await, "60");
}

#[actix_rt::test]
async fn test_income_update_with_budget_rejected() {
    let Some(app) = TestApp::spawn().await else { return };
    let token = app.register_verified_user("incomebudget").await;

    let income_id = app.create_category(&token, "Dividends", "income").await;
    let expense_id = app.create_category(&token, "Misc", "expense").await;
    let budget_id = app.create_budget(&token, Some(&expense_id)).await;

    let payload = json!({
        "categoryId": income_id,
        "amount": "200",
        "transactionDate": "2026-06-01"
    });
    let response = app.post("/transactions", &payload, Some(&token)).await;
    let txn: Value = response.json().await;
    let txn_id = txn["id"].as_str().unwrap().to_string();

    let payload = json!({
        "categoryId": income_id,
        "budgetId": budget_id,
        "amount": "200",
        "transactionDate": "2026-06-01"
    });
    let response = app
        .put(&format!("/transactions/{txn_id}"), &payload, Some(&token))
        .await;

    assert_eq!(response.status(), 400);
}

#[actix_rt::test]
async fn test_spend_clamps_to_zero_on_underflow() {
    let Some(app) = TestApp::spawn().await else { return };
    let token = app.register_verified_user("clamp").await;

    let expense_id = app.create_category(&token, "Hobby", "expense").await;
    let budget_id = app.create_budget(&token, Some(&expense_id)).await;

    let payload = json!({
        "categoryId": expense_id,
        "budgetId": budget_id,
        "amount": "90",
        "transactionDate": "2026-07-01"
    });
    let response = app.post("/transactions", &payload, Some(&token)).await;
    let txn: Value = response.json().await;
    let txn_id = txn["id"].as_str().unwrap().to_string();

    // External correction drops recorded spend below the transaction amount
    sqlx::query("UPDATE budgets SET spend_amount = 50 WHERE id = $1::uuid")
        .bind(&budget_id)
        .execute(&app.pool)
        .await
        .expect("Failed to apply manual correction");

    // Deleting the 90 transaction against 50 recorded spend floors at 0
    let response = app
        .delete(&format!("/transactions/{txn_id}"), Some(&token))
        .await;
    assert_eq!(response.status(), 204);

    assert_eq!(app.budget_spend(&budget_id).await, "0");
}

#[actix_rt::test]
async fn test_transaction_ownership_is_enforced() {
    let Some(app) = TestApp::spawn().await else { return };
    let owner_token = app.register_verified_user("txnowner").await;
    let intruder_token = app.register_verified_user("txnintruder").await;

    let expense_id = app.create_category(&owner_token, "Books", "expense").await;
    let budget_id = app.create_budget(&owner_token, Some(&expense_id)).await;

    let payload = json!({
        "categoryId": expense_id,
        "budgetId": budget_id,
        "amount": "25",
        "transactionDate": "2026-08-01"
    });
    let response = app.post("/transactions", &payload, Some(&owner_token)).await;
    let txn: Value = response.json().await;
    let txn_id = txn["id"].as_str().unwrap().to_string();

    let response = app
        .delete(&format!("/transactions/{txn_id}"), Some(&intruder_token))
        .await;
    assert_eq!(response.status(), 401);

    // Budget spend unchanged by the failed delete
    assert_eq!(app.budget_spend(&budget_id).await, "25");
}
