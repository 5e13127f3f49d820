//! Flat-file contact collection.

use std::path::{Path, PathBuf};

use chrono::Utc;
use outreach_shared::{Contact, ContactPatch, NewContact, OutreachError, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{read_optional, write_json_atomic};

/// Sent-state filter for [`ContactStore::list_filtered`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentFilter {
    Sent,
    Unsent,
}

/// Listing filter. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactFilter {
    pub status: Option<SentFilter>,
    /// Case-insensitive substring match on the niche. `"all"` disables it.
    pub niche: Option<String>,
}

impl ContactFilter {
    fn matches(&self, contact: &Contact) -> bool {
        let status_ok = match self.status {
            Some(SentFilter::Sent) => contact.email_sent,
            Some(SentFilter::Unsent) => !contact.email_sent,
            None => true,
        };
        let niche_ok = match self.niche.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(n) if n.eq_ignore_ascii_case("all") => true,
            Some(n) => contact
                .niche
                .to_lowercase()
                .contains(&n.to_lowercase()),
        };
        status_ok && niche_ok
    }
}

/// Aggregate counters over the collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactStats {
    pub total_clients: usize,
    pub emails_sent: usize,
    pub unsent_emails: usize,
}

/// Contact collection backed by one JSON array file.
///
/// Every mutation re-reads the file, applies the change in memory and
/// rewrites the whole file. Mutations are serialized by an async mutex.
pub struct ContactStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ContactStore {
    /// Open a store at `path`. The file is created lazily on first write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<Contact>> {
        match read_optional(&self.path).await? {
            None => Ok(Vec::new()),
            Some(content) if content.trim().is_empty() => Ok(Vec::new()),
            Some(content) => serde_json::from_str(&content).map_err(|e| {
                OutreachError::parse(format!("{}: {e}", self.path.display()))
            }),
        }
    }

    async fn persist(&self, contacts: &[Contact]) -> Result<()> {
        write_json_atomic(&self.path, contacts).await
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Every record, in insertion order.
    pub async fn list_all(&self) -> Result<Vec<Contact>> {
        self.load().await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Contact>> {
        Ok(self.load().await?.into_iter().find(|c| c.id.as_str() == id))
    }

    /// Lookup by email, case-insensitive.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Contact>> {
        let email = email.to_lowercase();
        Ok(self.load().await?.into_iter().find(|c| c.email == email))
    }

    /// Records whose message has not been sent yet.
    pub async fn list_unsent(&self) -> Result<Vec<Contact>> {
        Ok(self
            .load()
            .await?
            .into_iter()
            .filter(|c| !c.email_sent)
            .collect())
    }

    pub async fn list_filtered(&self, filter: &ContactFilter) -> Result<Vec<Contact>> {
        Ok(self
            .load()
            .await?
            .into_iter()
            .filter(|c| filter.matches(c))
            .collect())
    }

    pub async fn stats(&self) -> Result<ContactStats> {
        let contacts = self.load().await?;
        let emails_sent = contacts.iter().filter(|c| c.email_sent).count();
        Ok(ContactStats {
            total_clients: contacts.len(),
            emails_sent,
            unsent_emails: contacts.len() - emails_sent,
        })
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Insert a new record. If the email already exists the existing record
    /// is updated instead, so emails stay unique.
    pub async fn create(&self, new: NewContact) -> Result<Contact> {
        self.upsert_by_email(new).await
    }

    /// Update the record with the given email, or create it.
    pub async fn upsert_by_email(&self, new: NewContact) -> Result<Contact> {
        let _guard = self.write_lock.lock().await;
        let mut contacts = self.load().await?;
        let saved = upsert_in(&mut contacts, new);
        self.persist(&contacts).await?;
        Ok(saved)
    }

    /// Upsert a batch with a single file rewrite.
    pub async fn upsert_many(&self, batch: Vec<NewContact>) -> Result<Vec<Contact>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let _guard = self.write_lock.lock().await;
        let mut contacts = self.load().await?;
        let saved: Vec<Contact> = batch
            .into_iter()
            .map(|new| upsert_in(&mut contacts, new))
            .collect();
        self.persist(&contacts).await?;
        tracing::debug!(count = saved.len(), "upserted contacts");
        Ok(saved)
    }

    /// Apply a partial update to the record with `id`.
    pub async fn update(&self, id: &str, patch: ContactPatch) -> Result<Contact> {
        let _guard = self.write_lock.lock().await;
        let mut contacts = self.load().await?;

        if let Some(new_email) = patch.email.as_deref().map(str::to_lowercase) {
            if contacts
                .iter()
                .any(|c| c.email == new_email && c.id.as_str() != id)
            {
                return Err(OutreachError::Conflict(format!(
                    "another contact already uses {new_email}"
                )));
            }
        }

        let contact = contacts
            .iter_mut()
            .find(|c| c.id.as_str() == id)
            .ok_or_else(|| OutreachError::not_found("Contact", id))?;
        contact.apply(patch, Utc::now());
        let updated = contact.clone();

        self.persist(&contacts).await?;
        Ok(updated)
    }

    /// Remove the record with `id`. Returns whether anything was removed.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut contacts = self.load().await?;
        let before = contacts.len();
        contacts.retain(|c| c.id.as_str() != id);
        if contacts.len() == before {
            return Ok(false);
        }
        self.persist(&contacts).await?;
        Ok(true)
    }
}

fn upsert_in(contacts: &mut Vec<Contact>, mut new: NewContact) -> Contact {
    new.email = new.email.to_lowercase();
    let now = Utc::now();
    match contacts.iter_mut().find(|c| c.email == new.email) {
        Some(existing) => {
            existing.merge_new(new, now);
            existing.clone()
        }
        None => {
            let contact = Contact::from_new(new, now);
            contacts.push(contact.clone());
            contact
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outreach_shared::{DeliveryStatus, Platform};

    fn candidate(email: &str) -> NewContact {
        NewContact {
            email: email.into(),
            name: "Bloom Studio".into(),
            niche: "Florist".into(),
            platform: Platform::Instagram,
            profile_url: "https://instagram.com/bloom".into(),
            found_date: Utc::now(),
            snippet: "Fresh flowers daily".into(),
            email_subject: None,
            email_body: None,
        }
    }

    fn test_store() -> (tempfile::TempDir, ContactStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ContactStore::open(dir.path().join("data").join("clients.json"));
        (dir, store)
    }

    #[tokio::test]
    async fn empty_store_lists_nothing() {
        let (_dir, store) = test_store();
        assert!(store.list_all().await.unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn create_and_find() {
        let (_dir, store) = test_store();
        let created = store.create(candidate("Hello@Bloom.com")).await.unwrap();
        assert_eq!(created.email, "hello@bloom.com");
        assert!(!created.email_sent);

        let by_email = store.find_by_email("HELLO@bloom.com").await.unwrap();
        assert_eq!(by_email.as_ref().map(|c| &c.id), Some(&created.id));

        let by_id = store.find_by_id(created.id.as_str()).await.unwrap();
        assert_eq!(by_id.unwrap().name, "Bloom Studio");
    }

    #[tokio::test]
    async fn upsert_by_email_merges_second_payload() {
        let (_dir, store) = test_store();
        let first = store.upsert_by_email(candidate("a@bloom.com")).await.unwrap();

        let mut second = candidate("A@BLOOM.COM");
        second.name = "Bloom & Co".into();
        second.email_subject = Some("Hello".into());
        second.email_body = Some("Body".into());
        let merged = store.upsert_by_email(second).await.unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(merged.id, first.id);
        assert_eq!(all[0].name, "Bloom & Co");
        assert_eq!(all[0].email_subject.as_deref(), Some("Hello"));
    }

    #[tokio::test]
    async fn upsert_many_deduplicates_by_email() {
        let (_dir, store) = test_store();
        let saved = store
            .upsert_many(vec![
                candidate("one@x.com"),
                candidate("two@x.com"),
                candidate("ONE@x.com"),
            ])
            .await
            .unwrap();
        assert_eq!(saved.len(), 3);
        assert_eq!(store.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writes_are_not_lost() {
        let (_dir, store) = test_store();
        let store = std::sync::Arc::new(store);

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..20 {
            let store = store.clone();
            tasks.spawn(async move { store.create(candidate(&format!("c{i}@x.com"))).await });
        }
        let mut ids = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            ids.push(joined.unwrap().unwrap().id);
        }

        let mut tasks = tokio::task::JoinSet::new();
        for id in ids {
            let store = store.clone();
            tasks.spawn(async move {
                let patch = ContactPatch {
                    email_sent: Some(true),
                    ..Default::default()
                };
                store.update(id.as_str(), patch).await
            });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.unwrap().unwrap();
        }

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 20);
        assert!(all.iter().all(|c| c.email_sent));

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.len(), 20);
    }

    #[tokio::test]
    async fn update_missing_id_is_not_found() {
        let (_dir, store) = test_store();
        let err = store
            .update("missing", ContactPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OutreachError::NotFound { .. }));
    }

    #[tokio::test]
    async fn update_applies_delivery_fields() {
        let (_dir, store) = test_store();
        let c = store.create(candidate("a@x.com")).await.unwrap();
        let patch = ContactPatch {
            email_sent: Some(true),
            email_sent_date: Some(Utc::now()),
            delivery_status: Some(DeliveryStatus::Sent),
            notes: Some("Sent: <id@x>".into()),
            ..Default::default()
        };
        let updated = store.update(c.id.as_str(), patch).await.unwrap();
        assert!(updated.email_sent);
        assert_eq!(updated.delivery_status, Some(DeliveryStatus::Sent));

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_clients, 1);
        assert_eq!(stats.emails_sent, 1);
        assert_eq!(stats.unsent_emails, 0);
        assert!(store.list_unsent().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_rejects_duplicate_email() {
        let (_dir, store) = test_store();
        store.create(candidate("a@x.com")).await.unwrap();
        let b = store.create(candidate("b@x.com")).await.unwrap();
        let patch = ContactPatch {
            email: Some("A@x.com".into()),
            ..Default::default()
        };
        let err = store.update(b.id.as_str(), patch).await.unwrap_err();
        assert!(matches!(err, OutreachError::Conflict(_)));
    }

    #[tokio::test]
    async fn delete_reports_whether_removed() {
        let (_dir, store) = test_store();
        let c = store.create(candidate("a@x.com")).await.unwrap();
        assert!(store.delete(c.id.as_str()).await.unwrap());
        assert!(!store.delete(c.id.as_str()).await.unwrap());
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn filter_by_status_and_niche() {
        let (_dir, store) = test_store();
        let a = store.create(candidate("a@x.com")).await.unwrap();
        let mut bakery = candidate("b@x.com");
        bakery.niche = "Bakery".into();
        store.create(bakery).await.unwrap();
        store
            .update(
                a.id.as_str(),
                ContactPatch {
                    email_sent: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let sent = store
            .list_filtered(&ContactFilter {
                status: Some(SentFilter::Sent),
                niche: None,
            })
            .await
            .unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].email, "a@x.com");

        let bakeries = store
            .list_filtered(&ContactFilter {
                status: None,
                niche: Some("bak".into()),
            })
            .await
            .unwrap();
        assert_eq!(bakeries.len(), 1);

        let everything = store
            .list_filtered(&ContactFilter {
                status: None,
                niche: Some("all".into()),
            })
            .await
            .unwrap();
        assert_eq!(everything.len(), 2);
    }

    #[tokio::test]
    async fn corrupt_file_is_a_parse_error() {
        let (_dir, store) = test_store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{not json").unwrap();
        let err = store.list_all().await.unwrap_err();
        assert!(matches!(err, OutreachError::Parse { .. }));
    }

    #[tokio::test]
    async fn file_is_camel_case_json_array() {
        let (_dir, store) = test_store();
        store.create(candidate("a@x.com")).await.unwrap();
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.trim_start().starts_with('['));
        assert!(raw.contains("\"emailSent\": false"));
        assert!(raw.contains("\"profileUrl\""));
    }
}
