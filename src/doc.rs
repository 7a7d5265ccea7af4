//! OpenAPI document assembled from the handler annotations.

use utoipa::OpenApi;

use crate::domain::{Error, ErrorCode, Money, TransactionStatus, TransactionType};
use crate::inbound::http::accounts::{AccountResponse, CreateAccountRequest};
use crate::inbound::http::transactions::{CreateTransactionRequest, TransactionResponse};
use crate::inbound::http::{accounts, health, transactions};

/// Public OpenAPI surface served by Swagger UI in debug builds.
#[derive(OpenApi)]
#[openapi(
    paths(
        accounts::create_account,
        accounts::get_account,
        transactions::create_transaction,
        transactions::get_transaction,
        transactions::list_transactions,
        health::health,
    ),
    components(schemas(
        AccountResponse,
        CreateAccountRequest,
        CreateTransactionRequest,
        TransactionResponse,
        Error,
        ErrorCode,
        Money,
        TransactionStatus,
        TransactionType,
    )),
    tags(
        (name = "accounts", description = "Account creation and lookup"),
        (name = "transactions", description = "Transaction submission and history"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;
