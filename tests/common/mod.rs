#![allow(dead_code)]

use iou::application::Services;
use iou::domain::ids::UserId;
use iou::domain::ports::UserStore;
use iou::domain::user::{AppUser, Identity};
use iou::infrastructure::identity::InMemoryIdentityProvider;
use iou::infrastructure::in_memory::InMemoryStore;
use std::sync::Arc;

pub struct TestUser {
    pub identity: Identity,
    pub token: String,
}

impl TestUser {
    pub fn id(&self) -> UserId {
        self.identity.id
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

pub struct Fixture {
    pub store: InMemoryStore,
    pub identity: InMemoryIdentityProvider,
    pub services: Services,
}

impl Fixture {
    pub fn new() -> Self {
        let store = InMemoryStore::new();
        let identity = InMemoryIdentityProvider::new();
        let services = Services::new(Arc::new(identity.clone()), store.clone());
        Self {
            store,
            identity,
            services,
        }
    }

    /// Registers a user with a profile and a live session.
    pub async fn user(&self, name: &str) -> TestUser {
        let identity = Identity {
            id: UserId::new(),
            email: format!("{}@example.com", name.to_lowercase()),
        };
        self.store
            .upsert(AppUser::new(identity.id, &identity.email, name))
            .await
            .unwrap();
        let token = format!("tok-{}", name.to_lowercase());
        self.identity
            .register_session(token.clone(), identity.clone())
            .await;
        TestUser { identity, token }
    }

    /// Makes `a` and `b` contacts of each other through an accepted invitation.
    pub async fn connect(&self, a: &TestUser, b: &TestUser) {
        let invitation = self
            .services
            .contacts
            .invite(&a.identity, &b.identity.email)
            .await
            .unwrap();
        self.services
            .contacts
            .accept(&b.identity, invitation.id)
            .await
            .unwrap();
    }
}
