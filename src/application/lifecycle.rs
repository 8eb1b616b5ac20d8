use crate::domain::ids::{PaymentRequestId, UserId};
use crate::domain::payment_request::{PaymentStatus, TargetStatus};
use crate::domain::ports::PaymentRequestStoreRef;
use crate::error::{IouError, Result};

/// Applies terminal status transitions to payment requests.
///
/// The store's conditional update is the only write: a request that left
/// `pending` between the read and the write is reported as a conflict rather
/// than overwritten.
#[derive(Clone)]
pub struct PaymentRequestLifecycle {
    payment_requests: PaymentRequestStoreRef,
}

impl PaymentRequestLifecycle {
    pub fn new(payment_requests: PaymentRequestStoreRef) -> Self {
        Self { payment_requests }
    }

    /// Parses `target` and moves the request to it on behalf of `caller`.
    pub async fn transition(
        &self,
        request_id: PaymentRequestId,
        caller: UserId,
        target: &str,
    ) -> Result<PaymentStatus> {
        let target: TargetStatus = target.parse()?;
        self.apply(request_id, caller, target).await
    }

    pub async fn apply(
        &self,
        request_id: PaymentRequestId,
        caller: UserId,
        target: TargetStatus,
    ) -> Result<PaymentStatus> {
        let request = self
            .payment_requests
            .get(request_id)
            .await?
            .ok_or_else(|| IouError::not_found("Payment request not found"))?;

        request.authorize_transition(caller, target)?;

        let status = PaymentStatus::from(target);
        let updated = self
            .payment_requests
            .update_status_if_pending(request_id, status)
            .await?;
        if !updated {
            tracing::warn!(%request_id, %caller, "lost transition race");
            return Err(IouError::conflict(
                "Payment request is already in a final state",
            ));
        }

        tracing::info!(%request_id, %caller, %status, "payment request transitioned");
        Ok(status)
    }
}
