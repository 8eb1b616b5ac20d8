use super::contact::{Contact, ContactInvitation};
use super::ids::{InvitationId, PaymentRequestId, UserId};
use super::payment_request::{PaymentRequest, PaymentStatus};
use super::user::{AppUser, Identity};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Resolves session tokens to callers.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_user(&self, token: &str) -> Result<Option<Identity>>;
    async fn sign_out(&self, token: &str) -> Result<()>;
}

/// Result of the store's `check_user_exists_by_email` function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserLookup {
    pub exists: bool,
    pub user_id: Option<UserId>,
}

impl UserLookup {
    pub fn found(user_id: UserId) -> Self {
        Self {
            exists: true,
            user_id: Some(user_id),
        }
    }

    pub fn missing() -> Self {
        Self::default()
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn upsert(&self, user: AppUser) -> Result<()>;
    async fn get(&self, id: UserId) -> Result<Option<AppUser>>;
    async fn get_many(&self, ids: &[UserId]) -> Result<Vec<AppUser>>;
    /// Case-insensitive lookup of a registered user by email.
    async fn check_user_exists_by_email(&self, email: &str) -> Result<UserLookup>;
}

#[async_trait]
pub trait PaymentRequestStore: Send + Sync {
    async fn insert(&self, request: PaymentRequest) -> Result<()>;
    async fn get(&self, id: PaymentRequestId) -> Result<Option<PaymentRequest>>;
    /// Requests where `user` is either party, newest first.
    async fn list_for_user(&self, user: UserId) -> Result<Vec<PaymentRequest>>;
    /// Sets `status` only if the stored request is still pending.
    ///
    /// Returns `false` when the request exists but has already left `pending`,
    /// `NotFound` when it does not exist.
    async fn update_status_if_pending(
        &self,
        id: PaymentRequestId,
        status: PaymentStatus,
    ) -> Result<bool>;
}

#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Fails with `Conflict` if `(owner, contact_user)` is already present.
    async fn insert(&self, contact: Contact) -> Result<()>;
    async fn list_for_owner(&self, owner: UserId) -> Result<Vec<Contact>>;
    async fn find(&self, owner: UserId, contact_user: UserId) -> Result<Option<Contact>>;
}

#[async_trait]
pub trait InvitationStore: Send + Sync {
    /// Fails with `Conflict` if a pending invitation for the same
    /// `(inviter_id, invitee_email)` exists.
    async fn insert(&self, invitation: ContactInvitation) -> Result<()>;
    async fn get(&self, id: InvitationId) -> Result<Option<ContactInvitation>>;
    async fn find_pending(&self, inviter: UserId, email: &str)
    -> Result<Option<ContactInvitation>>;
    /// Pending invitations sent by `inviter`, newest first.
    async fn list_pending_sent(&self, inviter: UserId) -> Result<Vec<ContactInvitation>>;
    /// Pending invitations addressed to `user` by id or by email, newest first.
    async fn list_pending_received(
        &self,
        user: UserId,
        email: &str,
    ) -> Result<Vec<ContactInvitation>>;
    /// User id recorded on any invitation to `email` that has one.
    async fn find_invitee_by_email(&self, email: &str) -> Result<Option<UserId>>;
    /// Marks the invitation accepted by `invitee` and materializes a contact
    /// row for each party. Runs as one atomic step.
    async fn accept_contact_invitation(&self, id: InvitationId, invitee: UserId) -> Result<()>;
}

pub type IdentityProviderRef = Arc<dyn IdentityProvider>;
pub type UserStoreRef = Arc<dyn UserStore>;
pub type PaymentRequestStoreRef = Arc<dyn PaymentRequestStore>;
pub type ContactStoreRef = Arc<dyn ContactStore>;
pub type InvitationStoreRef = Arc<dyn InvitationStore>;
