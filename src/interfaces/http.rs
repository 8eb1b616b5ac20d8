//! # HTTP API
//!
//! Builds the axum router over [`Services`]. Every route except `/health`
//! needs an `Authorization: Bearer <token>` header resolved by the identity
//! provider.
//!
//! | Method | Path                                    | Description                      |
//! |--------|-----------------------------------------|----------------------------------|
//! | GET    | `/health`                               | Liveness probe                   |
//! | GET    | `/me`                                   | Caller identity and profile      |
//! | POST   | `/auth/sign-out`                        | Revoke the caller's session      |
//! | POST   | `/check-user-exists`                    | Invitee existence check          |
//! | GET    | `/payment-requests`                     | Caller's requests, newest first  |
//! | POST   | `/payment-requests`                     | Request payment from a contact   |
//! | GET    | `/payment-requests/:id`                 | One request                      |
//! | PATCH  | `/payment-requests/:id/update-status`   | Settle or cancel                 |
//! | GET    | `/contacts`                             | Contact list                     |
//! | POST   | `/contacts/invitations`                 | Invite an existing user          |
//! | GET    | `/contacts/invitations/sent`            | Pending invitations sent         |
//! | GET    | `/contacts/invitations/received`        | Pending invitations received     |
//! | POST   | `/contacts/invitations/:id/accept`      | Accept an invitation             |

use axum::{
    Json, Router,
    async_trait,
    extract::{FromRequestParts, Path, State, rejection::JsonRejection},
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::application::Services;
use crate::application::contacts::{ContactView, ReceivedInvitationView};
use crate::application::payments::PaymentRequestView;
use crate::domain::contact::ContactInvitation;
use crate::domain::ids::{InvitationId, PaymentRequestId, UserId};
use crate::domain::payment_request::{AmountCents, PaymentStatus, TargetStatus};
use crate::domain::user::Identity;
use crate::error::{IouError, Result};

pub fn create_router(services: Services) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/me", get(me_handler))
        .route("/auth/sign-out", post(sign_out_handler))
        .route("/check-user-exists", post(check_user_exists_handler))
        .route(
            "/payment-requests",
            get(list_payment_requests_handler).post(create_payment_request_handler),
        )
        .route("/payment-requests/:id", get(get_payment_request_handler))
        .route(
            "/payment-requests/:id/update-status",
            patch(update_status_handler),
        )
        .route("/contacts", get(list_contacts_handler))
        .route("/contacts/invitations", post(invite_handler))
        .route("/contacts/invitations/sent", get(sent_invitations_handler))
        .route(
            "/contacts/invitations/received",
            get(received_invitations_handler),
        )
        .route("/contacts/invitations/:id/accept", post(accept_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(services)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

impl IouError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            IouError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            IouError::Unauthorized => StatusCode::UNAUTHORIZED,
            IouError::Forbidden(_) => StatusCode::FORBIDDEN,
            IouError::NotFound(_) => StatusCode::NOT_FOUND,
            IouError::Conflict(_) => StatusCode::CONFLICT,
            IouError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for IouError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            IouError::Internal(err) => {
                tracing::error!(error = %err, "request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<JsonRejection> for IouError {
    fn from(rejection: JsonRejection) -> Self {
        IouError::InvalidInput(rejection.body_text())
    }
}

fn json_body<T>(body: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    let Json(value) = body?;
    Ok(value)
}

// ---------------------------------------------------------------------------
// Caller extraction
// ---------------------------------------------------------------------------

/// The authenticated caller together with the session token it came from.
#[derive(Debug, Clone)]
pub struct Caller {
    pub identity: Identity,
    pub token: String,
}

impl Caller {
    pub fn id(&self) -> UserId {
        self.identity.id
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<Services> for Caller {
    type Rejection = IouError;

    async fn from_request_parts(
        parts: &mut Parts,
        services: &Services,
    ) -> std::result::Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(IouError::Unauthorized)?;
        let identity = services
            .identity
            .current_user(token)
            .await?
            .ok_or(IouError::Unauthorized)?;
        Ok(Caller {
            identity,
            token: token.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct EmailBody {
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckUserExistsResponse {
    pub exists: bool,
    pub user_id: Option<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusBody {
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateStatusResponse {
    pub success: bool,
    pub status: PaymentStatus,
}

/// Body of `POST /payment-requests`. The amount is given either in pence
/// (`amount_cents`) or in pounds as a decimal string (`amount`).
#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequestBody {
    pub to_user: UserId,
    pub amount_cents: Option<u64>,
    pub amount: Option<String>,
    pub memo: Option<String>,
}

impl CreatePaymentRequestBody {
    fn amount(&self) -> Result<AmountCents> {
        match (self.amount_cents, self.amount.as_deref()) {
            (Some(cents), _) => AmountCents::new(cents),
            (None, Some(major)) => AmountCents::parse_major_units(major),
            (None, None) => Err(IouError::invalid_input("Amount is required")),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn me_handler(
    State(services): State<Services>,
    caller: Caller,
) -> Result<Json<MeResponse>> {
    let profile = services.contacts.ensure_profile(&caller.identity).await?;
    Ok(Json(MeResponse {
        id: caller.id(),
        email: caller.identity.email,
        display_name: profile.display_name,
    }))
}

async fn sign_out_handler(
    State(services): State<Services>,
    caller: Caller,
) -> Result<StatusCode> {
    services.identity.sign_out(&caller.token).await?;
    tracing::info!(user_id = %caller.id(), "signed out");
    Ok(StatusCode::NO_CONTENT)
}

async fn check_user_exists_handler(
    State(services): State<Services>,
    _caller: Caller,
    body: std::result::Result<Json<EmailBody>, JsonRejection>,
) -> Result<Json<CheckUserExistsResponse>> {
    let email = json_body(body)?.email.unwrap_or_default();
    let lookup = services.contacts.check_user_exists(&email).await?;
    Ok(Json(CheckUserExistsResponse {
        exists: lookup.exists,
        user_id: lookup.user_id,
    }))
}

async fn list_payment_requests_handler(
    State(services): State<Services>,
    caller: Caller,
) -> Result<Json<Vec<PaymentRequestView>>> {
    Ok(Json(services.payments.list_for_user(caller.id()).await?))
}

async fn create_payment_request_handler(
    State(services): State<Services>,
    caller: Caller,
    body: std::result::Result<Json<CreatePaymentRequestBody>, JsonRejection>,
) -> Result<(StatusCode, Json<PaymentRequestView>)> {
    let body = json_body(body)?;
    let amount = body.amount()?;
    let view = services
        .payments
        .create(caller.id(), body.to_user, amount, body.memo)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn get_payment_request_handler(
    State(services): State<Services>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<PaymentRequestView>> {
    let id: PaymentRequestId = id.parse()?;
    Ok(Json(services.payments.get(caller.id(), id).await?))
}

/// Input is validated before the caller is resolved, so a malformed request
/// is a 400 even without a session.
async fn update_status_handler(
    State(services): State<Services>,
    Path(id): Path<String>,
    caller: std::result::Result<Caller, IouError>,
    body: std::result::Result<Json<UpdateStatusBody>, JsonRejection>,
) -> Result<Json<UpdateStatusResponse>> {
    let id: PaymentRequestId = id
        .parse()
        .map_err(|_| IouError::invalid_input("Payment request ID is required"))?;
    let target: TargetStatus = json_body(body)?.status.unwrap_or_default().parse()?;
    let caller = caller?;

    let status = services.lifecycle.apply(id, caller.id(), target).await?;
    Ok(Json(UpdateStatusResponse {
        success: true,
        status,
    }))
}

async fn list_contacts_handler(
    State(services): State<Services>,
    caller: Caller,
) -> Result<Json<Vec<ContactView>>> {
    Ok(Json(services.contacts.list_contacts(caller.id()).await?))
}

async fn invite_handler(
    State(services): State<Services>,
    caller: Caller,
    body: std::result::Result<Json<EmailBody>, JsonRejection>,
) -> Result<(StatusCode, Json<ContactInvitation>)> {
    let email = json_body(body)?.email.unwrap_or_default();
    let invitation = services.contacts.invite(&caller.identity, &email).await?;
    Ok((StatusCode::CREATED, Json(invitation)))
}

async fn sent_invitations_handler(
    State(services): State<Services>,
    caller: Caller,
) -> Result<Json<Vec<ContactInvitation>>> {
    Ok(Json(services.contacts.pending_sent(caller.id()).await?))
}

async fn received_invitations_handler(
    State(services): State<Services>,
    caller: Caller,
) -> Result<Json<Vec<ReceivedInvitationView>>> {
    Ok(Json(services.contacts.pending_received(&caller.identity).await?))
}

async fn accept_handler(
    State(services): State<Services>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let id: InvitationId = id.parse()?;
    services.contacts.accept(&caller.identity, id).await?;
    Ok(Json(json!({ "success": true })))
}
