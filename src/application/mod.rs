//! Application layer: the operations the HTTP surface exposes, built on the
//! domain ports.
//!
//! `Services` bundles them over one set of adapters so the interface layer
//! can be handed a single value.

pub mod contacts;
pub mod lifecycle;
pub mod payments;

use crate::domain::ids::UserId;
use crate::domain::ports::{
    ContactStore, IdentityProviderRef, InvitationStore, PaymentRequestStore, UserStore,
    UserStoreRef,
};
use crate::error::Result;
use contacts::ContactService;
use lifecycle::PaymentRequestLifecycle;
use payments::PaymentRequestService;
use std::collections::HashMap;
use std::sync::Arc;

/// Any adapter that provides every record-store table.
pub trait RecordStore: UserStore + PaymentRequestStore + ContactStore + InvitationStore {}

impl<T> RecordStore for T where T: UserStore + PaymentRequestStore + ContactStore + InvitationStore {}

#[derive(Clone)]
pub struct Services {
    pub identity: IdentityProviderRef,
    pub users: UserStoreRef,
    pub lifecycle: PaymentRequestLifecycle,
    pub payments: PaymentRequestService,
    pub contacts: ContactService,
}

impl Services {
    pub fn new<S>(identity: IdentityProviderRef, store: S) -> Self
    where
        S: RecordStore + Clone + 'static,
    {
        let users: UserStoreRef = Arc::new(store.clone());
        Self {
            identity,
            lifecycle: PaymentRequestLifecycle::new(Arc::new(store.clone())),
            payments: PaymentRequestService::new(
                Arc::new(store.clone()),
                Arc::new(store.clone()),
                users.clone(),
            ),
            contacts: ContactService::new(users.clone(), Arc::new(store.clone()), Arc::new(store)),
            users,
        }
    }
}

pub(crate) async fn display_names(
    users: &UserStoreRef,
    ids: &[UserId],
) -> Result<HashMap<UserId, String>> {
    let mut unique = ids.to_vec();
    unique.sort();
    unique.dedup();
    if unique.is_empty() {
        return Ok(HashMap::new());
    }
    Ok(users
        .get_many(&unique)
        .await?
        .into_iter()
        .map(|u| (u.id, u.display_name))
        .collect())
}
