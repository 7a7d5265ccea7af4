//! Transaction API handlers.
//!
//! ```text
//! POST /transactions                           Submit a transaction
//! GET  /transactions/{id}                      Fetch a transaction
//! GET  /accounts/{account_id}/transactions     List an account's transactions
//! ```
//!
//! A successful submission returns `201` with `status = pending`: settlement
//! is asynchronous, and clients poll the transaction until it reaches a
//! terminal status.

use actix_web::{get, post, web, HttpResponse};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{
    AccountId, Error, Money, Reference, SubmitTransactionRequest, Transaction, TransactionId,
    TransactionStatus, TransactionType,
};
use crate::inbound::http::state::HttpState;
use crate::inbound::http::ApiResult;

const DEFAULT_LIMIT: i64 = 10;
const DEFAULT_OFFSET: i64 = 0;

/// Transaction submission request body.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct CreateTransactionRequest {
    pub account_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// Positive amount with at most two fractional digits.
    #[schema(value_type = f64, example = 50.00)]
    pub amount: Decimal,
    /// Optional idempotency token; resubmitting with the same reference
    /// replays the recorded transaction.
    #[serde(default)]
    pub reference: Option<String>,
}

/// Transaction representation returned by the API.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct TransactionResponse {
    pub id: String,
    pub account_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: Money,
    pub status: TransactionStatus,
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_before: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_after: Option<Money>,
    pub created_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionResponse {
    fn from(tx: Transaction) -> Self {
        Self {
            id: tx.id.to_string(),
            account_id: tx.account_id.to_string(),
            kind: tx.kind,
            amount: tx.amount,
            status: tx.status,
            reference: tx.reference.as_str().to_owned(),
            balance_before: tx.balance_before,
            balance_after: tx.balance_after,
            created_at: tx.created_at,
        }
    }
}

/// Paging query parameters, kept as raw strings so malformed values can fall
/// back to the defaults instead of failing extraction.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    limit: Option<String>,
    offset: Option<String>,
}

fn page_param(raw: Option<&str>, default: i64) -> i64 {
    raw.and_then(|value| value.parse::<i64>().ok())
        .filter(|value| *value >= 0)
        .unwrap_or(default)
}

/// Submit a deposit or withdrawal.
#[utoipa::path(
    post,
    path = "/transactions",
    request_body = CreateTransactionRequest,
    responses(
        (status = 201, description = "Transaction recorded; settlement is asynchronous", body = TransactionResponse),
        (status = 400, description = "Invalid request", body = Error),
        (status = 404, description = "No such account", body = Error),
        (status = 500, description = "Storage or broker unavailable", body = Error)
    ),
    tags = ["transactions"],
    operation_id = "createTransaction"
)]
#[post("/transactions")]
pub async fn create_transaction(
    state: web::Data<HttpState>,
    payload: web::Json<CreateTransactionRequest>,
) -> ApiResult<HttpResponse> {
    let payload = payload.into_inner();

    let account_id = AccountId::parse(&payload.account_id)
        .map_err(|_| Error::invalid_request("account id must be a UUID"))?;
    let amount = Money::new(payload.amount)
        .map_err(|err| Error::invalid_request(format!("amount: {err}")))?;
    // An empty reference counts as absent; the service generates one.
    let reference = payload
        .reference
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(Reference::new)
        .transpose()
        .map_err(|err| Error::invalid_request(err.to_string()))?;

    let transaction = state
        .transactions
        .submit(SubmitTransactionRequest {
            account_id,
            kind: payload.kind,
            amount,
            reference,
        })
        .await?;
    Ok(HttpResponse::Created().json(TransactionResponse::from(transaction)))
}

/// Fetch a transaction by id.
#[utoipa::path(
    get,
    path = "/transactions/{id}",
    params(("id" = String, Path, description = "Transaction identifier")),
    responses(
        (status = 200, description = "Transaction found", body = TransactionResponse),
        (status = 404, description = "No such transaction", body = Error)
    ),
    tags = ["transactions"],
    operation_id = "getTransaction"
)]
#[get("/transactions/{id}")]
pub async fn get_transaction(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id =
        TransactionId::parse(&path).map_err(|_| Error::not_found("transaction not found"))?;
    let transaction = state.transactions.get_transaction(id).await?;
    Ok(HttpResponse::Ok().json(TransactionResponse::from(transaction)))
}

/// List an account's transactions, newest first.
#[utoipa::path(
    get,
    path = "/accounts/{account_id}/transactions",
    params(
        ("account_id" = String, Path, description = "Account identifier"),
        ("limit" = Option<i64>, Query, description = "Page size, default 10"),
        ("offset" = Option<i64>, Query, description = "Page start, default 0")
    ),
    responses(
        (status = 200, description = "Transactions for the account", body = [TransactionResponse]),
        (status = 500, description = "Storage unavailable", body = Error)
    ),
    tags = ["transactions"],
    operation_id = "listTransactions"
)]
#[get("/accounts/{account_id}/transactions")]
pub async fn list_transactions(
    state: web::Data<HttpState>,
    path: web::Path<String>,
    query: web::Query<ListQuery>,
) -> ApiResult<HttpResponse> {
    let limit = page_param(query.limit.as_deref(), DEFAULT_LIMIT);
    let offset = page_param(query.offset.as_deref(), DEFAULT_OFFSET);

    // An unparseable account id owns no transactions.
    let Ok(account_id) = AccountId::parse(&path) else {
        return Ok(HttpResponse::Ok().json(Vec::<TransactionResponse>::new()));
    };

    let transactions = state
        .transactions
        .list_for_account(account_id, limit, offset)
        .await?;
    let response: Vec<TransactionResponse> = transactions
        .into_iter()
        .map(TransactionResponse::from)
        .collect();
    Ok(HttpResponse::Ok().json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbound::http::test_utils::test_app;
    use actix_web::http::StatusCode;
    use actix_web::test as actix_test;
    use rstest::rstest;
    use serde_json::{json, Value};

    async fn create_account(
        app: &impl actix_web::dev::Service<
            actix_http::Request,
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
        >,
        initial_balance: f64,
    ) -> String {
        let response = actix_test::call_service(
            app,
            actix_test::TestRequest::post()
                .uri("/accounts")
                .set_json(json!({ "initial_balance": initial_balance }))
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = actix_test::read_body_json(response).await;
        body["id"].as_str().expect("account id").to_owned()
    }

    #[actix_web::test]
    async fn submission_returns_pending_transaction() {
        let (app, _ports) = test_app();
        let app = actix_test::init_service(app).await;
        let account_id = create_account(&app, 100.0).await;

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/transactions")
                .set_json(json!({
                    "account_id": account_id,
                    "type": "deposit",
                    "amount": 50.00
                }))
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body: Value = actix_test::read_body_json(response).await;
        assert_eq!(body["status"], "pending");
        assert_eq!(body["amount"], "50.00");
        assert!(body.get("balance_after").is_none());
    }

    #[actix_web::test]
    async fn submission_against_unknown_account_is_not_found() {
        let (app, ports) = test_app();
        let app = actix_test::init_service(app).await;

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/transactions")
                .set_json(json!({
                    "account_id": "550e8400-e29b-41d4-a716-446655440000",
                    "type": "withdrawal",
                    "amount": 1.00
                }))
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        // The rejection happens before the intent write.
        assert!(ports.log.all().is_empty());
    }

    #[rstest]
    #[case(json!({ "account_id": "", "type": "deposit", "amount": 1.00 }))]
    #[case(json!({ "account_id": "550e8400-e29b-41d4-a716-446655440000", "type": "deposit", "amount": -1.00 }))]
    #[case(json!({ "account_id": "550e8400-e29b-41d4-a716-446655440000", "type": "deposit", "amount": 1.001 }))]
    #[actix_web::test]
    async fn invalid_submissions_are_rejected(#[case] payload: Value) {
        let (app, _ports) = test_app();
        let app = actix_test::init_service(app).await;

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/transactions")
                .set_json(payload)
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn resubmitted_reference_replays_the_same_transaction() {
        let (app, ports) = test_app();
        let app = actix_test::init_service(app).await;
        let account_id = create_account(&app, 100.0).await;

        let payload = json!({
            "account_id": account_id,
            "type": "deposit",
            "amount": 5.00,
            "reference": "r-1"
        });

        let mut ids = Vec::new();
        for _ in 0..3 {
            let response = actix_test::call_service(
                &app,
                actix_test::TestRequest::post()
                    .uri("/transactions")
                    .set_json(payload.clone())
                    .to_request(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::CREATED);
            let body: Value = actix_test::read_body_json(response).await;
            ids.push(body["id"].as_str().expect("id").to_owned());
        }

        assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(ports.log.all().len(), 1);
    }

    #[actix_web::test]
    async fn unknown_transaction_is_not_found() {
        let (app, _ports) = test_app();
        let app = actix_test::init_service(app).await;

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/transactions/550e8400-e29b-41d4-a716-446655440000")
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[rstest]
    #[case(None, None, 2)]
    #[case(Some("1"), None, 1)]
    #[case(Some("0"), None, 0)]
    #[case(Some("abc"), None, 2)]
    #[case(Some("-3"), None, 2)]
    #[case(None, Some("50"), 0)]
    #[actix_web::test]
    async fn listing_applies_paging_fallbacks(
        #[case] limit: Option<&str>,
        #[case] offset: Option<&str>,
        #[case] expected: usize,
    ) {
        let (app, _ports) = test_app();
        let app = actix_test::init_service(app).await;
        let account_id = create_account(&app, 100.0).await;

        for reference in ["r-1", "r-2"] {
            let response = actix_test::call_service(
                &app,
                actix_test::TestRequest::post()
                    .uri("/transactions")
                    .set_json(json!({
                        "account_id": account_id,
                        "type": "deposit",
                        "amount": 1.00,
                        "reference": reference
                    }))
                    .to_request(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let mut uri = format!("/accounts/{account_id}/transactions");
        let mut params = Vec::new();
        if let Some(limit) = limit {
            params.push(format!("limit={limit}"));
        }
        if let Some(offset) = offset {
            params.push(format!("offset={offset}"));
        }
        if !params.is_empty() {
            uri = format!("{uri}?{}", params.join("&"));
        }

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::get().uri(&uri).to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = actix_test::read_body_json(response).await;
        assert_eq!(body.as_array().expect("array body").len(), expected);
    }

    #[test]
    fn page_param_fallbacks() {
        assert_eq!(page_param(None, 10), 10);
        assert_eq!(page_param(Some("5"), 10), 5);
        assert_eq!(page_param(Some("0"), 10), 0);
        assert_eq!(page_param(Some("-1"), 10), 10);
        assert_eq!(page_param(Some("ten"), 10), 10);
    }
}
