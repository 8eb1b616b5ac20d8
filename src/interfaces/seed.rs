use crate::domain::ids::UserId;
use crate::domain::ports::UserStore;
use crate::domain::user::{AppUser, Identity, normalize_email};
use crate::error::{IouError, Result};
use crate::infrastructure::identity::InMemoryIdentityProvider;
use serde::Deserialize;
use std::path::Path;

/// One user registered at startup, with the session token they sign in with.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedUser {
    #[serde(default)]
    pub id: Option<UserId>,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub token: String,
}

pub fn parse_seed(json: &str) -> Result<Vec<SeedUser>> {
    let users: Vec<SeedUser> = serde_json::from_str(json)
        .map_err(|e| IouError::invalid_input(format!("Invalid seed file: {}", e)))?;
    for user in &users {
        if user.token.trim().is_empty() {
            return Err(IouError::invalid_input(format!(
                "Seed user {} has an empty token",
                user.email
            )));
        }
    }
    Ok(users)
}

/// Registers every seed user with the identity provider and stores their
/// profile. Returns how many users were loaded.
pub async fn load_seed_file(
    path: &Path,
    identity: &InMemoryIdentityProvider,
    users: &dyn UserStore,
) -> Result<usize> {
    let json = tokio::fs::read_to_string(path).await?;
    let seed = parse_seed(&json)?;
    for entry in &seed {
        let identity_record = Identity {
            id: entry.id.unwrap_or_default(),
            email: normalize_email(&entry.email),
        };
        let profile = match &entry.display_name {
            Some(name) => AppUser::new(identity_record.id, &entry.email, name.clone()),
            None => AppUser::from_identity(&identity_record),
        };
        users.upsert(profile).await?;
        identity
            .register_session(entry.token.clone(), identity_record.clone())
            .await;
        tracing::debug!(user_id = %identity_record.id, "seeded user");
    }
    tracing::info!(count = seed.len(), path = %path.display(), "seed users loaded");
    Ok(seed.len())
}
