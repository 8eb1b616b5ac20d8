use super::display_names;
use crate::domain::ids::{PaymentRequestId, UserId};
use crate::domain::payment_request::{AmountCents, PaymentRequest, TargetStatus};
use crate::domain::ports::{ContactStoreRef, PaymentRequestStoreRef, UserStoreRef};
use crate::error::{IouError, Result};
use serde::Serialize;

/// A payment request as seen by one of its parties.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRequestView {
    #[serde(flatten)]
    pub request: PaymentRequest,
    pub from_display_name: String,
    pub to_display_name: String,
    pub is_sender: bool,
    pub is_recipient: bool,
    pub can_settle: bool,
    pub can_cancel: bool,
}

/// Creates and lists payment requests.
#[derive(Clone)]
pub struct PaymentRequestService {
    payment_requests: PaymentRequestStoreRef,
    contacts: ContactStoreRef,
    users: UserStoreRef,
}

impl PaymentRequestService {
    pub fn new(
        payment_requests: PaymentRequestStoreRef,
        contacts: ContactStoreRef,
        users: UserStoreRef,
    ) -> Self {
        Self {
            payment_requests,
            contacts,
            users,
        }
    }

    /// Asks `to_user` to pay `caller`. The payer must be one of the caller's
    /// contacts.
    pub async fn create(
        &self,
        caller: UserId,
        to_user: UserId,
        amount: AmountCents,
        memo: Option<String>,
    ) -> Result<PaymentRequestView> {
        if to_user == caller {
            return Err(IouError::invalid_input(
                "You cannot request payment from yourself",
            ));
        }
        if self.contacts.find(caller, to_user).await?.is_none() {
            return Err(IouError::forbidden(
                "You can only request payment from your contacts",
            ));
        }

        let request = PaymentRequest::new(caller, to_user, amount, memo);
        self.payment_requests.insert(request.clone()).await?;
        tracing::info!(
            request_id = %request.id,
            from = %caller,
            to = %to_user,
            amount_cents = amount.value(),
            "payment request created"
        );

        let mut views = self.annotate(caller, vec![request]).await?;
        views
            .pop()
            .ok_or_else(|| IouError::internal("created payment request vanished"))
    }

    /// Requests where `caller` is either party, newest first.
    pub async fn list_for_user(&self, caller: UserId) -> Result<Vec<PaymentRequestView>> {
        let requests = self.payment_requests.list_for_user(caller).await?;
        self.annotate(caller, requests).await
    }

    /// A single request. Requests the caller is not a party to are reported as
    /// missing.
    pub async fn get(&self, caller: UserId, id: PaymentRequestId) -> Result<PaymentRequestView> {
        let request = self
            .payment_requests
            .get(id)
            .await?
            .filter(|r| r.involves(caller))
            .ok_or_else(|| IouError::not_found("Payment request not found"))?;
        let mut views = self.annotate(caller, vec![request]).await?;
        views
            .pop()
            .ok_or_else(|| IouError::not_found("Payment request not found"))
    }

    async fn annotate(
        &self,
        caller: UserId,
        requests: Vec<PaymentRequest>,
    ) -> Result<Vec<PaymentRequestView>> {
        let ids: Vec<UserId> = requests
            .iter()
            .flat_map(|r| [r.from_user, r.to_user])
            .collect();
        let names = display_names(&self.users, &ids).await?;
        let name_of = |id: &UserId| {
            names
                .get(id)
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string())
        };

        Ok(requests
            .into_iter()
            .map(|request| PaymentRequestView {
                from_display_name: name_of(&request.from_user),
                to_display_name: name_of(&request.to_user),
                is_sender: request.is_sender(caller),
                is_recipient: request.is_recipient(caller),
                can_settle: request.can_transition(caller, TargetStatus::Settled),
                can_cancel: request.can_transition(caller, TargetStatus::Cancelled),
                request,
            })
            .collect())
    }
}
