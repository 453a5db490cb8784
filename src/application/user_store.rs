use crate::domain::error::DomainError;
use crate::domain::models::UserDocument;
use crate::domain::repository::DocumentBackend;
use crate::domain::user::{NewUser, User, UserPatch, normalize_email};
use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, trace, warn};

/// Record store over a single JSON document.
///
/// Every operation loads the full document, applies its change and writes the
/// full document back. The sequence runs under one mutex so that concurrent
/// requests served by this process cannot lose each other's updates.
pub struct UserStore {
    backend: Arc<dyn DocumentBackend>,
    lock: Mutex<()>,
}

impl UserStore {
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        Self {
            backend,
            lock: Mutex::new(()),
        }
    }

    /// Loads the document, creating or resetting it when absent or unparsable,
    /// and persists the de-duplicated form before returning it.
    pub async fn load(&self) -> Result<UserDocument> {
        let _guard = self.lock.lock().await;
        self.load_locked().await
    }

    /// Overwrites the stored document unconditionally.
    pub async fn save(&self, document: &UserDocument) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.save_locked(document).await
    }

    #[instrument(skip(self, user), fields(email = %user.email))]
    pub async fn create(&self, user: NewUser) -> Result<User> {
        let _guard = self.lock.lock().await;
        let mut document = self.load_locked().await?;

        let email = normalize_email(&user.email);
        if document.find_by_email(&email).is_some() {
            warn!(email = %email, "User already exists");
            return Err(DomainError::Conflict("User Not Available".to_string()).into());
        }

        let id = document.next_id().ok_or_else(|| {
            warn!("User ids exhausted");
            DomainError::Internal("no user id left to assign".to_string())
        })?;

        let now = Utc::now();
        let record = User {
            id,
            name: user.name.trim().to_string(),
            email,
            password: user.password,
            confirm_password: user.confirm_password,
            created_at: now,
            updated_at: Some(now),
        };
        document.users.push(record.clone());
        self.save_locked(&document).await?;

        info!(user_id = record.id, email = %record.email, "User created");
        Ok(record)
    }

    pub async fn find_all(&self) -> Result<Vec<User>> {
        Ok(self.load().await?.users)
    }

    #[instrument(skip(self, password))]
    pub async fn find_by_credentials(&self, email: &str, password: &str) -> Result<Option<User>> {
        let document = self.load().await?;
        let email = normalize_email(email);
        let user = document
            .users
            .into_iter()
            .find(|u| u.has_email(&email) && u.password == password);
        match &user {
            Some(u) => debug!(user_id = u.id, "Credentials matched"),
            None => debug!(email = %email, "No user matches credentials"),
        }
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: u64) -> Result<User> {
        let document = self.load().await?;
        document
            .users
            .into_iter()
            .find(|u| u.id == id)
            .ok_or_else(|| DomainError::user_not_found(id).into())
    }

    /// Merges `patch` over the record. The id and creation time never change.
    #[instrument(skip(self, patch))]
    pub async fn update_by_id(&self, id: u64, patch: UserPatch) -> Result<User> {
        let _guard = self.lock.lock().await;
        let mut document = self.load_locked().await?;

        let index = document
            .position_by_id(id)
            .ok_or_else(|| DomainError::user_not_found(id))?;

        let email = patch.email.as_deref().map(normalize_email);
        if let Some(email) = &email {
            if let Some(other) = document.find_by_email(email).filter(|u| u.id != id) {
                warn!(user_id = id, other_id = other.id, "Email already taken");
                return Err(DomainError::Conflict("User Not Available".to_string()).into());
            }
        }

        let record = &mut document.users[index];
        if let Some(name) = patch.name {
            record.name = name.trim().to_string();
        }
        if let Some(email) = email {
            record.email = email;
        }
        if let Some(password) = patch.password {
            record.password = password;
        }
        if let Some(confirm_password) = patch.confirm_password {
            record.confirm_password = confirm_password;
        }
        record.updated_at = Some(Utc::now());

        let updated = record.clone();
        self.save_locked(&document).await?;

        info!(user_id = id, "User updated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_by_id(&self, id: u64) -> Result<User> {
        let _guard = self.lock.lock().await;
        let mut document = self.load_locked().await?;

        let index = document
            .position_by_id(id)
            .ok_or_else(|| DomainError::user_not_found(id))?;
        let removed = document.users.remove(index);
        self.save_locked(&document).await?;

        info!(user_id = id, email = %removed.email, "User deleted");
        Ok(removed)
    }

    async fn load_locked(&self) -> Result<UserDocument> {
        let mut document = match self.backend.read().await? {
            None => {
                debug!("Initializing empty store document");
                UserDocument::default()
            }
            Some(bytes) => match serde_json::from_slice::<UserDocument>(&bytes) {
                Ok(document) => document,
                Err(e) => {
                    warn!(error = %e, "Store document is corrupt, resetting to empty");
                    UserDocument::default()
                }
            },
        };

        let removed = document.dedupe();
        if removed > 0 {
            warn!(removed = removed, "Removed users with duplicate emails");
        }
        self.save_locked(&document).await?;

        trace!(users = document.users.len(), "Store document loaded");
        Ok(document)
    }

    async fn save_locked(&self, document: &UserDocument) -> Result<()> {
        let bytes =
            serde_json::to_vec_pretty(document).context("cannot serialize store document")?;
        self.backend.write(&bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::memory::InMemoryDocumentBackend;

    fn new_user(name: &str, email: &str, password: &str) -> NewUser {
        NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            confirm_password: String::new(),
        }
    }

    fn store_with(backend: &InMemoryDocumentBackend) -> UserStore {
        UserStore::new(Arc::new(backend.clone()))
    }

    async fn stored_document(backend: &InMemoryDocumentBackend) -> UserDocument {
        serde_json::from_slice(&backend.contents().await.unwrap()).unwrap()
    }

    fn is_conflict(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<DomainError>(), Some(DomainError::Conflict(_)))
    }

    fn is_not_found(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<DomainError>(), Some(DomainError::NotFound(_)))
    }

    #[tokio::test]
    async fn test_load_creates_missing_document() {
        let backend = InMemoryDocumentBackend::new();
        let store = store_with(&backend);

        let document = store.load().await.unwrap();

        assert!(document.users.is_empty());
        assert_eq!(stored_document(&backend).await, UserDocument::default());
    }

    #[tokio::test]
    async fn test_load_resets_corrupt_document() {
        let backend = InMemoryDocumentBackend::with_contents("{ not json");
        let store = store_with(&backend);

        let document = store.load().await.unwrap();

        assert!(document.users.is_empty());
        assert_eq!(stored_document(&backend).await, UserDocument::default());
    }

    #[tokio::test]
    async fn test_load_dedupes_and_persists() {
        let backend = InMemoryDocumentBackend::with_contents(
            serde_json::json!({
                "users": [
                    {"id": 1, "name": "A", "email": "a@x.com", "password": "p", "createdAt": "2024-01-01T00:00:00Z"},
                    {"id": 2, "name": "A2", "email": "A@X.COM", "password": "q", "createdAt": "2024-01-02T00:00:00Z"},
                    {"id": 3, "name": "B", "email": "b@x.com", "password": "r", "createdAt": "2024-01-03T00:00:00Z"}
                ]
            })
            .to_string(),
        );
        let store = store_with(&backend);

        let document = store.load().await.unwrap();

        let ids: Vec<u64> = document.users.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(stored_document(&backend).await, document);
    }

    #[tokio::test]
    async fn test_load_is_idempotent() {
        let backend = InMemoryDocumentBackend::new();
        let store = store_with(&backend);
        store.create(new_user("A", "a@x.com", "p")).await.unwrap();
        store.create(new_user("B", "b@x.com", "q")).await.unwrap();

        let first = store.load().await.unwrap();
        let second = store.load().await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_save_overwrites_document() {
        let backend = InMemoryDocumentBackend::new();
        let store = store_with(&backend);
        store.create(new_user("A", "a@x.com", "p")).await.unwrap();

        store.save(&UserDocument::default()).await.unwrap();

        assert!(store.load().await.unwrap().users.is_empty());
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_ids_and_normalizes() {
        let store = store_with(&InMemoryDocumentBackend::new());

        let a = store.create(new_user("  A ", " A@X.com ", "p")).await.unwrap();
        let b = store.create(new_user("B", "b@x.com", "q")).await.unwrap();

        assert_eq!(a.id, 1);
        assert_eq!(a.name, "A");
        assert_eq!(a.email, "a@x.com");
        assert_eq!(b.id, 2);
    }

    #[tokio::test]
    async fn test_create_duplicate_email_conflicts() {
        let store = store_with(&InMemoryDocumentBackend::new());
        store.create(new_user("A", "A@X.com", "p")).await.unwrap();

        let err = store.create(new_user("B", "  a@x.COM", "q")).await.unwrap_err();

        assert!(is_conflict(&err));
        assert_eq!(store.find_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ids_never_reused_after_delete_of_lower_id() {
        let store = store_with(&InMemoryDocumentBackend::new());
        store.create(new_user("A", "a@x.com", "p")).await.unwrap();
        let b = store.create(new_user("B", "b@x.com", "p")).await.unwrap();
        store.delete_by_id(1).await.unwrap();

        let c = store.create(new_user("C", "c@x.com", "p")).await.unwrap();

        assert!(c.id > b.id);
    }

    #[tokio::test]
    async fn test_create_with_max_id_in_use_fails_without_writing() {
        let backend = InMemoryDocumentBackend::with_contents(
            serde_json::json!({
                "users": [
                    {"id": u64::MAX, "name": "A", "email": "a@x.com", "password": "p", "createdAt": "2024-01-01T00:00:00Z"}
                ]
            })
            .to_string(),
        );
        let store = store_with(&backend);

        let err = store.create(new_user("B", "b@x.com", "q")).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::Internal(_))
        ));
        let stored = stored_document(&backend).await;
        assert_eq!(stored.users.len(), 1);
        assert_eq!(stored.users[0].id, u64::MAX);
    }

    #[tokio::test]
    async fn test_create_then_find_by_id_round_trip() {
        let store = store_with(&InMemoryDocumentBackend::new());
        let input = NewUser {
            name: "Eve".to_string(),
            email: "eve@example.com".to_string(),
            password: "pw".to_string(),
            confirm_password: "pw".to_string(),
        };

        let created = store.create(input.clone()).await.unwrap();
        let found = store.find_by_id(created.id).await.unwrap();

        assert_eq!(found, created);
        assert_eq!(found.name, input.name);
        assert_eq!(found.email, input.email);
        assert_eq!(found.password, input.password);
        assert_eq!(found.confirm_password, input.confirm_password);
    }

    #[tokio::test]
    async fn test_find_by_credentials() {
        let store = store_with(&InMemoryDocumentBackend::new());
        store.create(new_user("A", "a@x.com", "secret")).await.unwrap();

        let hit = store.find_by_credentials(" A@x.com", "secret").await.unwrap();
        let wrong_password = store.find_by_credentials("a@x.com", "Secret").await.unwrap();
        let unknown = store.find_by_credentials("z@x.com", "secret").await.unwrap();

        assert_eq!(hit.unwrap().name, "A");
        assert!(wrong_password.is_none());
        assert!(unknown.is_none());
    }

    #[tokio::test]
    async fn test_find_by_id_unknown_is_not_found() {
        let store = store_with(&InMemoryDocumentBackend::new());
        let err = store.find_by_id(42).await.unwrap_err();
        assert!(is_not_found(&err));
    }

    #[tokio::test]
    async fn test_update_merges_patch_and_keeps_id() {
        let store = store_with(&InMemoryDocumentBackend::new());
        let created = store.create(new_user("A", "a@x.com", "p")).await.unwrap();

        let updated = store
            .update_by_id(
                created.id,
                UserPatch {
                    name: Some(" Alice ".to_string()),
                    email: Some("ALICE@x.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.name, "Alice");
        assert_eq!(updated.email, "alice@x.com");
        assert_eq!(updated.password, "p");
        assert_eq!(store.find_by_id(created.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_to_taken_email_conflicts() {
        let store = store_with(&InMemoryDocumentBackend::new());
        store.create(new_user("A", "a@x.com", "p")).await.unwrap();
        let b = store.create(new_user("B", "b@x.com", "p")).await.unwrap();

        let err = store
            .update_by_id(
                b.id,
                UserPatch {
                    email: Some("A@X.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        assert!(is_conflict(&err));
        assert_eq!(store.find_by_id(b.id).await.unwrap().email, "b@x.com");
    }

    #[tokio::test]
    async fn test_update_to_own_email_is_allowed() {
        let store = store_with(&InMemoryDocumentBackend::new());
        let a = store.create(new_user("A", "a@x.com", "p")).await.unwrap();

        let updated = store
            .update_by_id(
                a.id,
                UserPatch {
                    email: Some("A@x.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.email, "a@x.com");
    }

    #[tokio::test]
    async fn test_update_unknown_is_not_found() {
        let store = store_with(&InMemoryDocumentBackend::new());
        let err = store.update_by_id(5, UserPatch::default()).await.unwrap_err();
        assert!(is_not_found(&err));
    }

    #[tokio::test]
    async fn test_delete_returns_removed_record() {
        let store = store_with(&InMemoryDocumentBackend::new());
        let a = store.create(new_user("A", "a@x.com", "p")).await.unwrap();

        let removed = store.delete_by_id(a.id).await.unwrap();

        assert_eq!(removed, a);
        assert!(store.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_unknown_leaves_store_unchanged() {
        let backend = InMemoryDocumentBackend::new();
        let store = store_with(&backend);
        store.create(new_user("A", "a@x.com", "p")).await.unwrap();
        let before = stored_document(&backend).await;

        let err = store.delete_by_id(99).await.unwrap_err();

        assert!(is_not_found(&err));
        assert_eq!(stored_document(&backend).await, before);
    }

    #[tokio::test]
    async fn test_concurrent_creates_get_unique_ids() {
        let store = Arc::new(store_with(&InMemoryDocumentBackend::new()));

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .create(new_user("U", &format!("user{}@example.com", i), "p"))
                        .await
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        let mut ids: Vec<u64> = store.find_all().await.unwrap().iter().map(|u| u.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=10).collect::<Vec<u64>>());
    }
}
