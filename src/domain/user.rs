use super::ids::UserId;
use serde::{Deserialize, Serialize};

/// The caller as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub email: String,
}

/// Profile row kept in the record store (`app_users`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppUser {
    pub id: UserId,
    /// Always stored lower-cased.
    pub email: String,
    pub display_name: String,
}

impl AppUser {
    pub fn new(id: UserId, email: &str, display_name: impl Into<String>) -> Self {
        Self {
            id,
            email: normalize_email(email),
            display_name: display_name.into(),
        }
    }

    /// Builds the profile created on the fly for an identity that has none.
    ///
    /// The display name is the local part of the email, or `User <id prefix>`
    /// when no email is known.
    pub fn from_identity(identity: &Identity) -> Self {
        let email = normalize_email(&identity.email);
        let display_name = match email.split('@').next() {
            Some(local) if !local.is_empty() => local.to_string(),
            _ => {
                let id = identity.id.to_string();
                format!("User {}", &id[..8])
            }
        };
        Self {
            id: identity.id,
            email,
            display_name,
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Loose `local@domain.tld` shape check, enough to reject obvious typos.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}
