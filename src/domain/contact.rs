use super::ids::{ContactId, InvitationId, UserId};
use super::user::normalize_email;
use crate::error::{IouError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An entry in `owner`'s contact list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub owner: UserId,
    /// `None` until the contact is resolved to a registered user.
    pub contact_user: Option<UserId>,
    pub name: Option<String>,
}

impl Contact {
    pub fn new(owner: UserId, contact_user: UserId, name: Option<String>) -> Self {
        Self {
            id: ContactId::new(),
            owner,
            contact_user: Some(contact_user),
            name,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.contact_user.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    #[default]
    Pending,
    Accepted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInvitation {
    pub id: InvitationId,
    pub inviter_id: UserId,
    /// Always stored lower-cased.
    pub invitee_email: String,
    pub invitee_user_id: Option<UserId>,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
}

impl ContactInvitation {
    pub fn new(inviter_id: UserId, invitee_email: &str, invitee_user_id: Option<UserId>) -> Self {
        Self {
            id: InvitationId::new(),
            inviter_id,
            invitee_email: normalize_email(invitee_email),
            invitee_user_id,
            status: InvitationStatus::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == InvitationStatus::Pending
    }

    /// An invitation is addressed to a user either by id or by email.
    pub fn is_addressed_to(&self, user: UserId, email: &str) -> bool {
        self.invitee_user_id == Some(user)
            || (!email.trim().is_empty() && self.invitee_email == normalize_email(email))
    }

    /// Marks the invitation accepted by `invitee` and returns the contact rows
    /// each party gains: `(inviter -> invitee, invitee -> inviter)`.
    pub fn accept(&mut self, invitee: UserId) -> Result<(Contact, Contact)> {
        if !self.is_pending() {
            return Err(IouError::conflict("Invitation has already been accepted"));
        }
        self.status = InvitationStatus::Accepted;
        self.invitee_user_id = Some(invitee);
        Ok((
            Contact::new(self.inviter_id, invitee, None),
            Contact::new(invitee, self.inviter_id, None),
        ))
    }
}
