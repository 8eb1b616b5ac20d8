use super::display_names;
use crate::domain::contact::ContactInvitation;
use crate::domain::ids::{ContactId, InvitationId, UserId};
use crate::domain::ports::{ContactStoreRef, InvitationStoreRef, UserLookup, UserStoreRef};
use crate::domain::user::{AppUser, Identity, is_valid_email, normalize_email};
use crate::error::{IouError, Result};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactView {
    pub id: ContactId,
    pub contact_user: UserId,
    pub name: Option<String>,
    pub display_name: Option<String>,
}

impl ContactView {
    fn sort_key(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceivedInvitationView {
    #[serde(flatten)]
    pub invitation: ContactInvitation,
    pub inviter_display_name: Option<String>,
}

/// Contact list, invitations and the invitee existence check.
#[derive(Clone)]
pub struct ContactService {
    users: UserStoreRef,
    contacts: ContactStoreRef,
    invitations: InvitationStoreRef,
}

impl ContactService {
    pub fn new(
        users: UserStoreRef,
        contacts: ContactStoreRef,
        invitations: InvitationStoreRef,
    ) -> Self {
        Self {
            users,
            contacts,
            invitations,
        }
    }

    /// Looks up a registered user by email.
    ///
    /// When the store's lookup function fails, an invitation to that email
    /// carrying a user id counts as proof of existence. If that also fails or
    /// finds nothing the user is reported as missing; this path never errors.
    pub async fn check_user_exists(&self, email: &str) -> Result<UserLookup> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(IouError::invalid_input("Email is required"));
        }

        match self.users.check_user_exists_by_email(&email).await {
            Ok(lookup) => Ok(lookup),
            Err(err) => {
                tracing::warn!(error = %err, "user lookup failed, falling back to invitations");
                match self.invitations.find_invitee_by_email(&email).await {
                    Ok(Some(user_id)) => Ok(UserLookup::found(user_id)),
                    Ok(None) => Ok(UserLookup::missing()),
                    Err(err) => {
                        tracing::warn!(error = %err, "invitation fallback lookup failed");
                        Ok(UserLookup::missing())
                    }
                }
            }
        }
    }

    /// Sends a contact invitation from `caller` to an existing user.
    pub async fn invite(&self, caller: &Identity, email: &str) -> Result<ContactInvitation> {
        if !is_valid_email(email) {
            return Err(IouError::invalid_input("Please enter a valid email address"));
        }
        let email = normalize_email(email);

        self.ensure_profile(caller).await?;

        if normalize_email(&caller.email) == email {
            return Err(IouError::invalid_input("You cannot invite yourself"));
        }

        let lookup = self.check_user_exists(&email).await?;
        if !lookup.exists {
            return Err(IouError::not_found(
                "This user does not exist. For now, you can only invite users who already have an account.",
            ));
        }

        if let Some(invitee) = lookup.user_id
            && self.contacts.find(caller.id, invitee).await?.is_some()
        {
            return Err(IouError::conflict("This user is already in your contacts"));
        }

        if self
            .invitations
            .find_pending(caller.id, &email)
            .await?
            .is_some()
        {
            return Err(IouError::conflict(
                "You have already sent an invitation to this email",
            ));
        }

        let invitation = ContactInvitation::new(caller.id, &email, lookup.user_id);
        self.invitations.insert(invitation.clone()).await?;
        tracing::info!(invitation_id = %invitation.id, inviter = %caller.id, "invitation sent");
        Ok(invitation)
    }

    /// Accepts an invitation addressed to `caller`, making both parties
    /// contacts of each other.
    pub async fn accept(&self, caller: &Identity, invitation_id: InvitationId) -> Result<()> {
        let invitation = self
            .invitations
            .get(invitation_id)
            .await?
            .ok_or_else(|| IouError::not_found("Invitation not found"))?;

        if !invitation.is_addressed_to(caller.id, &caller.email) {
            return Err(IouError::forbidden(
                "This invitation is not addressed to you",
            ));
        }
        if !invitation.is_pending() {
            return Err(IouError::conflict("Invitation has already been accepted"));
        }

        self.ensure_profile(caller).await?;
        self.invitations
            .accept_contact_invitation(invitation_id, caller.id)
            .await?;
        tracing::info!(%invitation_id, invitee = %caller.id, "invitation accepted");
        Ok(())
    }

    /// Resolved contacts of `caller`, sorted by display name.
    pub async fn list_contacts(&self, caller: UserId) -> Result<Vec<ContactView>> {
        let contacts = self.contacts.list_for_owner(caller).await?;
        let ids: Vec<UserId> = contacts.iter().filter_map(|c| c.contact_user).collect();
        let names = display_names(&self.users, &ids).await?;

        let mut views: Vec<ContactView> = contacts
            .into_iter()
            .filter_map(|c| {
                let contact_user = c.contact_user?;
                Some(ContactView {
                    id: c.id,
                    contact_user,
                    name: c.name,
                    display_name: names.get(&contact_user).cloned(),
                })
            })
            .collect();
        views.sort_by(|a, b| a.sort_key().cmp(b.sort_key()));
        Ok(views)
    }

    pub async fn pending_sent(&self, caller: UserId) -> Result<Vec<ContactInvitation>> {
        self.invitations.list_pending_sent(caller).await
    }

    pub async fn pending_received(&self, caller: &Identity) -> Result<Vec<ReceivedInvitationView>> {
        let invitations = self
            .invitations
            .list_pending_received(caller.id, &caller.email)
            .await?;
        let ids: Vec<UserId> = invitations.iter().map(|i| i.inviter_id).collect();
        let names = display_names(&self.users, &ids).await?;

        Ok(invitations
            .into_iter()
            .map(|invitation| ReceivedInvitationView {
                inviter_display_name: names.get(&invitation.inviter_id).cloned(),
                invitation,
            })
            .collect())
    }

    /// Returns the caller's profile, creating it if this is their first visit.
    pub async fn ensure_profile(&self, caller: &Identity) -> Result<AppUser> {
        if let Some(user) = self.users.get(caller.id).await? {
            return Ok(user);
        }
        let user = AppUser::from_identity(caller);
        self.users.upsert(user.clone()).await?;
        tracing::info!(user_id = %user.id, "profile created");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::contact::Contact;
    use crate::domain::ports::{ContactStore, InvitationStore, UserStore};
    use crate::infrastructure::in_memory::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::Arc;

    fn identity(email: &str) -> Identity {
        Identity {
            id: UserId::new(),
            email: email.to_string(),
        }
    }

    async fn setup() -> (InMemoryStore, ContactService, Identity, Identity) {
        let store = InMemoryStore::new();
        let service = ContactService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
        );
        let alice = identity("alice@example.com");
        let bob = identity("bob@example.com");
        store
            .upsert(AppUser::new(alice.id, &alice.email, "Alice"))
            .await
            .unwrap();
        store
            .upsert(AppUser::new(bob.id, &bob.email, "Bob"))
            .await
            .unwrap();
        (store, service, alice, bob)
    }

    /// Delegates to the in-memory store but fails the email lookup function.
    struct BrokenLookup(InMemoryStore);

    #[async_trait]
    impl UserStore for BrokenLookup {
        async fn upsert(&self, user: AppUser) -> Result<()> {
            self.0.upsert(user).await
        }
        async fn get(&self, id: UserId) -> Result<Option<AppUser>> {
            UserStore::get(&self.0, id).await
        }
        async fn get_many(&self, ids: &[UserId]) -> Result<Vec<AppUser>> {
            self.0.get_many(ids).await
        }
        async fn check_user_exists_by_email(&self, _email: &str) -> Result<UserLookup> {
            Err(IouError::internal("function check_user_exists_by_email does not exist"))
        }
    }

    #[tokio::test]
    async fn test_check_user_exists_primary_path() {
        let (_, service, _, bob) = setup().await;
        assert_eq!(
            service.check_user_exists(" BOB@example.com ").await.unwrap(),
            UserLookup::found(bob.id)
        );
        assert_eq!(
            service.check_user_exists("nobody@example.com").await.unwrap(),
            UserLookup::missing()
        );
        assert!(matches!(
            service.check_user_exists("  ").await,
            Err(IouError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_check_user_exists_fallback() {
        let store = InMemoryStore::new();
        let service = ContactService::new(
            Arc::new(BrokenLookup(store.clone())),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
        );
        let bob = UserId::new();
        InvitationStore::insert(
            &store,
            ContactInvitation::new(UserId::new(), "bob@example.com", Some(bob)),
        )
        .await
        .unwrap();
        InvitationStore::insert(
            &store,
            ContactInvitation::new(UserId::new(), "carol@example.com", None),
        )
        .await
        .unwrap();

        assert_eq!(
            service.check_user_exists("bob@example.com").await.unwrap(),
            UserLookup::found(bob)
        );
        // Carol may well exist; the fallback cannot tell.
        assert_eq!(
            service.check_user_exists("carol@example.com").await.unwrap(),
            UserLookup::missing()
        );
    }

    #[tokio::test]
    async fn test_invite_and_accept() {
        let (store, service, alice, bob) = setup().await;

        let invitation = service.invite(&alice, "Bob@Example.com").await.unwrap();
        assert_eq!(invitation.invitee_email, "bob@example.com");
        assert_eq!(invitation.invitee_user_id, Some(bob.id));

        assert_eq!(service.pending_sent(alice.id).await.unwrap().len(), 1);
        let received = service.pending_received(&bob).await.unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].inviter_display_name.as_deref(), Some("Alice"));

        service.accept(&bob, invitation.id).await.unwrap();

        assert!(store.find(alice.id, bob.id).await.unwrap().is_some());
        assert!(store.find(bob.id, alice.id).await.unwrap().is_some());
        assert!(service.pending_sent(alice.id).await.unwrap().is_empty());
        assert!(service.pending_received(&bob).await.unwrap().is_empty());

        let contacts = service.list_contacts(alice.id).await.unwrap();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].display_name.as_deref(), Some("Bob"));

        assert!(matches!(
            service.accept(&bob, invitation.id).await,
            Err(IouError::Conflict(_))
        ));
        assert!(matches!(
            service.invite(&alice, "bob@example.com").await,
            Err(IouError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_invite_rejections() {
        let (_, service, alice, _) = setup().await;

        assert!(matches!(
            service.invite(&alice, "not-an-email").await,
            Err(IouError::InvalidInput(_))
        ));
        assert!(matches!(
            service.invite(&alice, "ALICE@example.com").await,
            Err(IouError::InvalidInput(_))
        ));
        assert!(matches!(
            service.invite(&alice, "ghost@example.com").await,
            Err(IouError::NotFound(_))
        ));

        service.invite(&alice, "bob@example.com").await.unwrap();
        assert!(matches!(
            service.invite(&alice, "bob@example.com").await,
            Err(IouError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_invite_creates_missing_profile() {
        let (store, service, _, _) = setup().await;
        let newcomer = identity("dave@example.com");

        service.invite(&newcomer, "bob@example.com").await.unwrap();

        let profile = UserStore::get(&store, newcomer.id).await.unwrap().unwrap();
        assert_eq!(profile.display_name, "dave");
    }

    #[tokio::test]
    async fn test_accept_requires_addressee() {
        let (_, service, alice, bob) = setup().await;
        let invitation = service.invite(&alice, "bob@example.com").await.unwrap();

        let mallory = identity("mallory@example.com");
        assert!(matches!(
            service.accept(&mallory, invitation.id).await,
            Err(IouError::Forbidden(_))
        ));
        assert!(matches!(
            service.accept(&alice, invitation.id).await,
            Err(IouError::Forbidden(_))
        ));
        assert!(matches!(
            service.accept(&bob, InvitationId::new()).await,
            Err(IouError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_contacts_skips_unresolved_and_sorts() {
        let (store, service, alice, bob) = setup().await;
        let carol = UserId::new();
        ContactStore::insert(&store, Contact::new(alice.id, bob.id, None))
            .await
            .unwrap();
        ContactStore::insert(&store, Contact::new(alice.id, carol, Some("Aaron".into())))
            .await
            .unwrap();
        ContactStore::insert(
            &store,
            Contact {
                id: ContactId::new(),
                owner: alice.id,
                contact_user: None,
                name: Some("Pending".into()),
            },
        )
        .await
        .unwrap();

        let contacts = service.list_contacts(alice.id).await.unwrap();
        let keys: Vec<_> = contacts.iter().map(|c| c.sort_key().to_string()).collect();
        assert_eq!(keys, vec!["Aaron", "Bob"]);
    }
}
