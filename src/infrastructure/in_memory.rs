use crate::domain::contact::{Contact, ContactInvitation};
use crate::domain::ids::{InvitationId, PaymentRequestId, UserId};
use crate::domain::payment_request::{PaymentRequest, PaymentStatus};
use crate::domain::ports::{
    ContactStore, InvitationStore, PaymentRequestStore, UserLookup, UserStore,
};
use crate::domain::user::{AppUser, normalize_email};
use crate::error::{IouError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    app_users: HashMap<UserId, AppUser>,
    payment_requests: HashMap<PaymentRequestId, PaymentRequest>,
    contacts: Vec<Contact>,
    contact_invitations: HashMap<InvitationId, ContactInvitation>,
}

/// A thread-safe in-memory record store.
///
/// All tables sit behind a single `Arc<RwLock<..>>`, so every operation,
/// including the conditional status update and invitation acceptance, is
/// atomic with respect to every other. `Clone` shares the same tables.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T>(rows: &mut [T], created_at: impl Fn(&T) -> chrono::DateTime<chrono::Utc>) {
    rows.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn upsert(&self, user: AppUser) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.app_users.insert(user.id, user);
        Ok(())
    }

    async fn get(&self, id: UserId) -> Result<Option<AppUser>> {
        let tables = self.tables.read().await;
        Ok(tables.app_users.get(&id).cloned())
    }

    async fn get_many(&self, ids: &[UserId]) -> Result<Vec<AppUser>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.app_users.get(id).cloned())
            .collect())
    }

    async fn check_user_exists_by_email(&self, email: &str) -> Result<UserLookup> {
        let email = normalize_email(email);
        let tables = self.tables.read().await;
        Ok(tables
            .app_users
            .values()
            .find(|u| u.email == email)
            .map(|u| UserLookup::found(u.id))
            .unwrap_or_else(UserLookup::missing))
    }
}

#[async_trait]
impl PaymentRequestStore for InMemoryStore {
    async fn insert(&self, request: PaymentRequest) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.payment_requests.contains_key(&request.id) {
            return Err(IouError::conflict("Payment request already exists"));
        }
        tables.payment_requests.insert(request.id, request);
        Ok(())
    }

    async fn get(&self, id: PaymentRequestId) -> Result<Option<PaymentRequest>> {
        let tables = self.tables.read().await;
        Ok(tables.payment_requests.get(&id).cloned())
    }

    async fn list_for_user(&self, user: UserId) -> Result<Vec<PaymentRequest>> {
        let tables = self.tables.read().await;
        let mut requests: Vec<PaymentRequest> = tables
            .payment_requests
            .values()
            .filter(|r| r.involves(user))
            .cloned()
            .collect();
        newest_first(&mut requests, |r| r.created_at);
        Ok(requests)
    }

    async fn update_status_if_pending(
        &self,
        id: PaymentRequestId,
        status: PaymentStatus,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let request = tables
            .payment_requests
            .get_mut(&id)
            .ok_or_else(|| IouError::not_found("Payment request not found"))?;
        if request.status != PaymentStatus::Pending {
            return Ok(false);
        }
        request.status = status;
        Ok(true)
    }
}

fn insert_contact(tables: &mut Tables, contact: Contact) -> Result<()> {
    let duplicate = contact.is_resolved()
        && tables
            .contacts
            .iter()
            .any(|c| c.owner == contact.owner && c.contact_user == contact.contact_user);
    if duplicate {
        return Err(IouError::conflict("This user is already in your contacts"));
    }
    tables.contacts.push(contact);
    Ok(())
}

#[async_trait]
impl ContactStore for InMemoryStore {
    async fn insert(&self, contact: Contact) -> Result<()> {
        let mut tables = self.tables.write().await;
        insert_contact(&mut tables, contact)
    }

    async fn list_for_owner(&self, owner: UserId) -> Result<Vec<Contact>> {
        let tables = self.tables.read().await;
        Ok(tables
            .contacts
            .iter()
            .filter(|c| c.owner == owner)
            .cloned()
            .collect())
    }

    async fn find(&self, owner: UserId, contact_user: UserId) -> Result<Option<Contact>> {
        let tables = self.tables.read().await;
        Ok(tables
            .contacts
            .iter()
            .find(|c| c.owner == owner && c.contact_user == Some(contact_user))
            .cloned())
    }
}

#[async_trait]
impl InvitationStore for InMemoryStore {
    async fn insert(&self, invitation: ContactInvitation) -> Result<()> {
        let mut tables = self.tables.write().await;
        let duplicate = invitation.is_pending()
            && tables.contact_invitations.values().any(|i| {
                i.is_pending()
                    && i.inviter_id == invitation.inviter_id
                    && i.invitee_email == invitation.invitee_email
            });
        if duplicate {
            return Err(IouError::conflict(
                "You have already sent an invitation to this email",
            ));
        }
        tables.contact_invitations.insert(invitation.id, invitation);
        Ok(())
    }

    async fn get(&self, id: InvitationId) -> Result<Option<ContactInvitation>> {
        let tables = self.tables.read().await;
        Ok(tables.contact_invitations.get(&id).cloned())
    }

    async fn find_pending(
        &self,
        inviter: UserId,
        email: &str,
    ) -> Result<Option<ContactInvitation>> {
        let email = normalize_email(email);
        let tables = self.tables.read().await;
        Ok(tables
            .contact_invitations
            .values()
            .find(|i| i.is_pending() && i.inviter_id == inviter && i.invitee_email == email)
            .cloned())
    }

    async fn list_pending_sent(&self, inviter: UserId) -> Result<Vec<ContactInvitation>> {
        let tables = self.tables.read().await;
        let mut invitations: Vec<ContactInvitation> = tables
            .contact_invitations
            .values()
            .filter(|i| i.is_pending() && i.inviter_id == inviter)
            .cloned()
            .collect();
        newest_first(&mut invitations, |i| i.created_at);
        Ok(invitations)
    }

    async fn list_pending_received(
        &self,
        user: UserId,
        email: &str,
    ) -> Result<Vec<ContactInvitation>> {
        let tables = self.tables.read().await;
        let mut invitations: Vec<ContactInvitation> = tables
            .contact_invitations
            .values()
            .filter(|i| i.is_pending() && i.is_addressed_to(user, email))
            .cloned()
            .collect();
        newest_first(&mut invitations, |i| i.created_at);
        Ok(invitations)
    }

    async fn find_invitee_by_email(&self, email: &str) -> Result<Option<UserId>> {
        let email = normalize_email(email);
        let tables = self.tables.read().await;
        Ok(tables
            .contact_invitations
            .values()
            .filter(|i| i.invitee_email == email)
            .find_map(|i| i.invitee_user_id))
    }

    async fn accept_contact_invitation(&self, id: InvitationId, invitee: UserId) -> Result<()> {
        let mut tables = self.tables.write().await;
        let mut invitation = tables
            .contact_invitations
            .get(&id)
            .cloned()
            .ok_or_else(|| IouError::not_found("Invitation not found"))?;

        let (forward, backward) = invitation.accept(invitee)?;
        for contact in [forward, backward] {
            let owner = contact.owner;
            let exists = tables
                .contacts
                .iter()
                .any(|c| c.owner == owner && c.contact_user == contact.contact_user);
            if !exists {
                insert_contact(&mut tables, contact)?;
            }
        }
        tables.contact_invitations.insert(id, invitation);
        Ok(())
    }
}
