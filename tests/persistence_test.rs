#![cfg(feature = "storage-rocksdb")]

use iou::application::Services;
use iou::domain::contact::ContactInvitation;
use iou::domain::ids::UserId;
use iou::domain::payment_request::{AmountCents, PaymentStatus};
use iou::domain::ports::{InvitationStore, UserStore};
use iou::domain::user::{AppUser, Identity};
use iou::infrastructure::identity::InMemoryIdentityProvider;
use iou::infrastructure::rocksdb::RocksDBStore;
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::test]
async fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    let alice = Identity {
        id: UserId::new(),
        email: "alice@example.com".to_string(),
    };
    let bob = Identity {
        id: UserId::new(),
        email: "bob@example.com".to_string(),
    };

    // 1. First run: connect Alice and Bob, create a request.
    let request_id = {
        let store = RocksDBStore::open(&db_path).unwrap();
        store
            .upsert(AppUser::new(alice.id, &alice.email, "Alice"))
            .await
            .unwrap();
        store
            .upsert(AppUser::new(bob.id, &bob.email, "Bob"))
            .await
            .unwrap();
        let invitation = ContactInvitation::new(alice.id, &bob.email, Some(bob.id));
        let invitation_id = invitation.id;
        InvitationStore::insert(&store, invitation).await.unwrap();
        store
            .accept_contact_invitation(invitation_id, bob.id)
            .await
            .unwrap();

        let services = Services::new(Arc::new(InMemoryIdentityProvider::new()), store);
        services
            .payments
            .create(alice.id, bob.id, AmountCents::new(500).unwrap(), None)
            .await
            .unwrap()
            .request
            .id
    };

    // 2. Second run on the same path: the request survived and can be settled once.
    let store = RocksDBStore::open(&db_path).unwrap();
    let services = Services::new(Arc::new(InMemoryIdentityProvider::new()), store);

    let listed = services.payments.list_for_user(bob.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].from_display_name, "Alice");

    services
        .lifecycle
        .transition(request_id, bob.id, "settled")
        .await
        .unwrap();
    drop(services);

    let store = RocksDBStore::open(&db_path).unwrap();
    let services = Services::new(Arc::new(InMemoryIdentityProvider::new()), store);
    let stored = services.payments.get(alice.id, request_id).await.unwrap();
    assert_eq!(stored.request.status, PaymentStatus::Settled);
    assert_eq!(services.contacts.list_contacts(bob.id).await.unwrap().len(), 1);
}
