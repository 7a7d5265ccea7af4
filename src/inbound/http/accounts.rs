//! Account API handlers.
//!
//! ```text
//! POST /accounts        Create an account
//! GET  /accounts/{id}   Fetch an account
//! ```

use actix_web::{get, post, web, HttpResponse};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{Account, AccountId, Error, Money};
use crate::inbound::http::state::HttpState;
use crate::inbound::http::ApiResult;

/// Account creation request body.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct CreateAccountRequest {
    /// Starting balance; must be non-negative with at most two fractional
    /// digits.
    #[schema(value_type = f64, example = 100.00)]
    pub initial_balance: Decimal,
}

/// Account representation returned by the API.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct AccountResponse {
    pub id: String,
    pub balance: Money,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id.to_string(),
            balance: account.balance,
            created_at: account.created_at,
        }
    }
}

/// Create an account.
#[utoipa::path(
    post,
    path = "/accounts",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Account created", body = AccountResponse),
        (status = 400, description = "Invalid initial balance", body = Error)
    ),
    tags = ["accounts"],
    operation_id = "createAccount"
)]
#[post("/accounts")]
pub async fn create_account(
    state: web::Data<HttpState>,
    payload: web::Json<CreateAccountRequest>,
) -> ApiResult<HttpResponse> {
    let initial_balance = Money::new(payload.initial_balance)
        .map_err(|err| Error::invalid_request(format!("initial balance: {err}")))?;
    let account = state.accounts.create_account(initial_balance).await?;
    Ok(HttpResponse::Created().json(AccountResponse::from(account)))
}

/// Fetch an account by id.
#[utoipa::path(
    get,
    path = "/accounts/{id}",
    params(("id" = String, Path, description = "Account identifier")),
    responses(
        (status = 200, description = "Account found", body = AccountResponse),
        (status = 404, description = "No such account", body = Error)
    ),
    tags = ["accounts"],
    operation_id = "getAccount"
)]
#[get("/accounts/{id}")]
pub async fn get_account(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    // The id space is opaque to clients; an unparseable id is simply an
    // account that does not exist.
    let id = AccountId::parse(&path).map_err(|_| Error::not_found("account not found"))?;
    let account = state.accounts.get_account(id).await?;
    Ok(HttpResponse::Ok().json(AccountResponse::from(account)))
}
