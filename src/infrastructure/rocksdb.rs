use crate::domain::contact::{Contact, ContactInvitation};
use crate::domain::ids::{InvitationId, PaymentRequestId, UserId};
use crate::domain::payment_request::{PaymentRequest, PaymentStatus};
use crate::domain::ports::{
    ContactStore, InvitationStore, PaymentRequestStore, UserLookup, UserStore,
};
use crate::domain::user::{AppUser, normalize_email};
use crate::error::{IouError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for user profiles.
pub const CF_APP_USERS: &str = "app_users";
/// Column Family for payment requests.
pub const CF_PAYMENT_REQUESTS: &str = "payment_requests";
/// Column Family for contact rows.
pub const CF_CONTACTS: &str = "contacts";
/// Column Family for contact invitations.
pub const CF_CONTACT_INVITATIONS: &str = "contact_invitations";

/// A persistent record store using RocksDB.
///
/// Each table lives in its own Column Family, keyed by the record's UUID
/// bytes with JSON values. Read-check-write operations (conditional status
/// update, uniqueness-checked inserts, invitation acceptance) are serialized
/// through `write_lock`; acceptance commits through a single `WriteBatch`.
///
/// `Clone` shares the underlying `Arc<DB>` and lock.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, creating
    /// any missing column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [
            CF_APP_USERS,
            CF_PAYMENT_REQUESTS,
            CF_CONTACTS,
            CF_CONTACT_INVITATIONS,
        ]
        .into_iter()
        .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
        .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| IouError::internal(format!("{} column family not found", name)))
    }

    fn put<T: Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let bytes = serde_json::to_vec(value)?;
        self.db.put_cf(cf, key, bytes)?;
        Ok(())
    }

    fn get_json<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            rows.push(serde_json::from_slice(&value)?);
        }
        Ok(rows)
    }

    fn contacts_of(&self, owner: UserId) -> Result<Vec<Contact>> {
        Ok(self
            .scan::<Contact>(CF_CONTACTS)?
            .into_iter()
            .filter(|c| c.owner == owner)
            .collect())
    }
}

#[async_trait]
impl UserStore for RocksDBStore {
    async fn upsert(&self, user: AppUser) -> Result<()> {
        self.put(CF_APP_USERS, user.id.as_bytes(), &user)
    }

    async fn get(&self, id: UserId) -> Result<Option<AppUser>> {
        self.get_json(CF_APP_USERS, id.as_bytes())
    }

    async fn get_many(&self, ids: &[UserId]) -> Result<Vec<AppUser>> {
        let mut users = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(user) = self.get_json(CF_APP_USERS, id.as_bytes())? {
                users.push(user);
            }
        }
        Ok(users)
    }

    async fn check_user_exists_by_email(&self, email: &str) -> Result<UserLookup> {
        let email = normalize_email(email);
        Ok(self
            .scan::<AppUser>(CF_APP_USERS)?
            .into_iter()
            .find(|u| u.email == email)
            .map(|u| UserLookup::found(u.id))
            .unwrap_or_else(UserLookup::missing))
    }
}

#[async_trait]
impl PaymentRequestStore for RocksDBStore {
    async fn insert(&self, request: PaymentRequest) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self
            .get_json::<PaymentRequest>(CF_PAYMENT_REQUESTS, request.id.as_bytes())?
            .is_some()
        {
            return Err(IouError::conflict("Payment request already exists"));
        }
        self.put(CF_PAYMENT_REQUESTS, request.id.as_bytes(), &request)
    }

    async fn get(&self, id: PaymentRequestId) -> Result<Option<PaymentRequest>> {
        self.get_json(CF_PAYMENT_REQUESTS, id.as_bytes())
    }

    async fn list_for_user(&self, user: UserId) -> Result<Vec<PaymentRequest>> {
        let mut requests: Vec<PaymentRequest> = self
            .scan::<PaymentRequest>(CF_PAYMENT_REQUESTS)?
            .into_iter()
            .filter(|r| r.involves(user))
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    async fn update_status_if_pending(
        &self,
        id: PaymentRequestId,
        status: PaymentStatus,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut request: PaymentRequest = self
            .get_json(CF_PAYMENT_REQUESTS, id.as_bytes())?
            .ok_or_else(|| IouError::not_found("Payment request not found"))?;
        if request.status != PaymentStatus::Pending {
            return Ok(false);
        }
        request.status = status;
        self.put(CF_PAYMENT_REQUESTS, id.as_bytes(), &request)?;
        Ok(true)
    }
}

#[async_trait]
impl ContactStore for RocksDBStore {
    async fn insert(&self, contact: Contact) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if contact.is_resolved()
            && self
                .contacts_of(contact.owner)?
                .iter()
                .any(|c| c.contact_user == contact.contact_user)
        {
            return Err(IouError::conflict("This user is already in your contacts"));
        }
        self.put(CF_CONTACTS, contact.id.as_bytes(), &contact)
    }

    async fn list_for_owner(&self, owner: UserId) -> Result<Vec<Contact>> {
        self.contacts_of(owner)
    }

    async fn find(&self, owner: UserId, contact_user: UserId) -> Result<Option<Contact>> {
        Ok(self
            .contacts_of(owner)?
            .into_iter()
            .find(|c| c.contact_user == Some(contact_user)))
    }
}

#[async_trait]
impl InvitationStore for RocksDBStore {
    async fn insert(&self, invitation: ContactInvitation) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if invitation.is_pending()
            && self
                .scan::<ContactInvitation>(CF_CONTACT_INVITATIONS)?
                .iter()
                .any(|i| {
                    i.is_pending()
                        && i.inviter_id == invitation.inviter_id
                        && i.invitee_email == invitation.invitee_email
                })
        {
            return Err(IouError::conflict(
                "You have already sent an invitation to this email",
            ));
        }
        self.put(CF_CONTACT_INVITATIONS, invitation.id.as_bytes(), &invitation)
    }

    async fn get(&self, id: InvitationId) -> Result<Option<ContactInvitation>> {
        self.get_json(CF_CONTACT_INVITATIONS, id.as_bytes())
    }

    async fn find_pending(
        &self,
        inviter: UserId,
        email: &str,
    ) -> Result<Option<ContactInvitation>> {
        let email = normalize_email(email);
        Ok(self
            .scan::<ContactInvitation>(CF_CONTACT_INVITATIONS)?
            .into_iter()
            .find(|i| i.is_pending() && i.inviter_id == inviter && i.invitee_email == email))
    }

    async fn list_pending_sent(&self, inviter: UserId) -> Result<Vec<ContactInvitation>> {
        let mut invitations: Vec<ContactInvitation> = self
            .scan::<ContactInvitation>(CF_CONTACT_INVITATIONS)?
            .into_iter()
            .filter(|i| i.is_pending() && i.inviter_id == inviter)
            .collect();
        invitations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invitations)
    }

    async fn list_pending_received(
        &self,
        user: UserId,
        email: &str,
    ) -> Result<Vec<ContactInvitation>> {
        let mut invitations: Vec<ContactInvitation> = self
            .scan::<ContactInvitation>(CF_CONTACT_INVITATIONS)?
            .into_iter()
            .filter(|i| i.is_pending() && i.is_addressed_to(user, email))
            .collect();
        invitations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invitations)
    }

    async fn find_invitee_by_email(&self, email: &str) -> Result<Option<UserId>> {
        let email = normalize_email(email);
        Ok(self
            .scan::<ContactInvitation>(CF_CONTACT_INVITATIONS)?
            .into_iter()
            .filter(|i| i.invitee_email == email)
            .find_map(|i| i.invitee_user_id))
    }

    async fn accept_contact_invitation(&self, id: InvitationId, invitee: UserId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut invitation: ContactInvitation = self
            .get_json(CF_CONTACT_INVITATIONS, id.as_bytes())?
            .ok_or_else(|| IouError::not_found("Invitation not found"))?;

        let (forward, backward) = invitation.accept(invitee)?;

        let mut batch = WriteBatch::default();
        let contacts_cf = self.cf(CF_CONTACTS)?;
        for contact in [forward, backward] {
            let exists = self
                .contacts_of(contact.owner)?
                .iter()
                .any(|c| c.contact_user == contact.contact_user);
            if !exists {
                batch.put_cf(contacts_cf, contact.id.as_bytes(), serde_json::to_vec(&contact)?);
            }
        }
        batch.put_cf(
            self.cf(CF_CONTACT_INVITATIONS)?,
            id.as_bytes(),
            serde_json::to_vec(&invitation)?,
        );
        self.db.write(batch)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment_request::AmountCents;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).expect("Failed to open RocksDB");

        for name in [
            CF_APP_USERS,
            CF_PAYMENT_REQUESTS,
            CF_CONTACTS,
            CF_CONTACT_INVITATIONS,
        ] {
            assert!(store.db.cf_handle(name).is_some());
        }
    }

    #[tokio::test]
    async fn test_rocksdb_user_store() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();

        let user = AppUser::new(UserId::new(), "Alice@Example.com", "alice");
        store.upsert(user.clone()).await.unwrap();

        assert_eq!(UserStore::get(&store, user.id).await.unwrap(), Some(user.clone()));
        assert_eq!(
            store
                .check_user_exists_by_email("alice@example.com")
                .await
                .unwrap(),
            UserLookup::found(user.id)
        );
        assert_eq!(
            store.get_many(&[user.id, UserId::new()]).await.unwrap(),
            vec![user]
        );
    }

    #[tokio::test]
    async fn test_rocksdb_conditional_update() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();

        let req = PaymentRequest::new(
            UserId::new(),
            UserId::new(),
            AmountCents::new(500).unwrap(),
            Some("Dinner".to_string()),
        );
        PaymentRequestStore::insert(&store, req.clone()).await.unwrap();

        assert!(
            store
                .update_status_if_pending(req.id, PaymentStatus::Cancelled)
                .await
                .unwrap()
        );
        assert!(
            !store
                .update_status_if_pending(req.id, PaymentStatus::Settled)
                .await
                .unwrap()
        );

        let stored = PaymentRequestStore::get(&store, req.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, PaymentStatus::Cancelled);
        assert_eq!(stored.memo.as_deref(), Some("Dinner"));
    }

    #[tokio::test]
    async fn test_rocksdb_accept_invitation() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let (alice, bob) = (UserId::new(), UserId::new());

        let invitation = ContactInvitation::new(alice, "bob@example.com", Some(bob));
        let id = invitation.id;
        InvitationStore::insert(&store, invitation).await.unwrap();
        assert_eq!(store.list_pending_received(bob, "").await.unwrap().len(), 1);

        store.accept_contact_invitation(id, bob).await.unwrap();

        assert!(store.find(alice, bob).await.unwrap().is_some());
        assert!(store.find(bob, alice).await.unwrap().is_some());
        assert!(store.list_pending_received(bob, "").await.unwrap().is_empty());
    }
}
