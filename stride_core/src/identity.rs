//! Anonymous identity bootstrap.
//!
//! Every store path is namespaced by a stable per-user identifier. The
//! identifier is minted on first run and persisted; an unreadable identity
//! file re-bootstraps a fresh anonymous session, matching how anonymous
//! sign-in behaves when local session state is lost.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use uuid::Uuid;

/// The local user identity
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    /// Set when the anonymous session is upgraded to a named account
    #[serde(default)]
    pub email: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Identity {
    fn anonymous() -> Self {
        Self {
            user_id: Uuid::new_v4(),
            email: None,
            created_at: chrono::Utc::now(),
        }
    }

    /// Load the identity file, creating a fresh anonymous identity if the
    /// file is missing or unreadable
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(contents) => match serde_json::from_str::<Identity>(&contents) {
                    Ok(identity) => {
                        tracing::debug!("Loaded identity from {:?}", path);
                        return Ok(identity);
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Failed to parse identity file {:?}: {}. Re-bootstrapping.",
                            path,
                            e
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        "Unable to read identity file {:?}: {}. Re-bootstrapping.",
                        path,
                        e
                    );
                }
            }
        }

        let identity = Self::anonymous();
        identity.save(path)?;
        tracing::info!("Created anonymous identity {}", identity.user_id);
        Ok(identity)
    }

    /// Attach an email to the stored identity, keeping the same user id
    pub fn attach_email(path: &Path, email: &str) -> Result<Self> {
        let mut identity = Self::load_or_create(path)?;
        identity.email = Some(email.to_string());
        identity.save(path)?;
        Ok(identity)
    }

    /// Atomically write the identity file (temp file, then rename)
    fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let temp = NamedTempFile::new_in(path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "identity path missing parent")
        })?)?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(self)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_stable_across_loads() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("identity.json");

        let first = Identity::load_or_create(&path).unwrap();
        let second = Identity::load_or_create(&path).unwrap();
        assert_eq!(first.user_id, second.user_id);
    }

    #[test]
    fn test_corrupt_identity_rebootstraps() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("identity.json");
        std::fs::write(&path, "{ not json }").unwrap();

        let identity = Identity::load_or_create(&path).unwrap();
        assert!(identity.email.is_none());

        // The fresh identity is persisted
        let again = Identity::load_or_create(&path).unwrap();
        assert_eq!(identity.user_id, again.user_id);
    }

    #[test]
    fn test_attach_email_keeps_user_id() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("identity.json");

        let anonymous = Identity::load_or_create(&path).unwrap();
        let upgraded = Identity::attach_email(&path, "runner@example.com").unwrap();

        assert_eq!(anonymous.user_id, upgraded.user_id);
        assert_eq!(upgraded.email.as_deref(), Some("runner@example.com"));
    }
}
