//! Core domain types for Outreach contacts and search results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{OutreachError, Result};

// ---------------------------------------------------------------------------
// ContactId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for contact identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactId(pub String);

impl ContactId {
    /// Generate a new time-sortable contact identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ContactId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ContactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContactId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Social platform a contact was discovered on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    Facebook,
    X,
    #[default]
    Unknown,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Instagram => "instagram",
            Self::Facebook => "facebook",
            Self::X => "x",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the last delivery attempt for a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Input to the search stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    /// Business niche, e.g. `bakery`.
    pub niche: String,
    /// Country name used as a quoted search term.
    pub country: String,
    /// Email provider domain without the `@`, e.g. `gmail.com`.
    pub email_provider: String,
    /// Platform domains to search, e.g. `instagram.com`.
    #[serde(deserialize_with = "deserialize_platforms")]
    pub platforms: Vec<String>,
}

impl SearchParams {
    /// Reject malformed input before any provider is called.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.niche.trim().is_empty() {
            missing.push("niche");
        }
        if self.country.trim().is_empty() {
            missing.push("country");
        }
        if self.email_provider.trim().trim_start_matches('@').is_empty() {
            missing.push("emailProvider");
        }
        if self.platforms.iter().all(|p| p.trim().is_empty()) {
            missing.push("platforms");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(OutreachError::validation(format!(
                "missing search input: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Split a comma-separated platform list, dropping blanks.
pub fn parse_platform_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

fn deserialize_platforms<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Platforms {
        Joined(String),
        List(Vec<String>),
    }

    Ok(match Platforms::deserialize(deserializer)? {
        Platforms::Joined(raw) => parse_platform_list(&raw),
        Platforms::List(list) => list
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect(),
    })
}

/// One organic result as returned by a search provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// A search result annotated with the query context it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub niche: String,
    /// The platform domain that was searched (not the detected platform).
    pub platform: String,
    pub searched_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Contacts
// ---------------------------------------------------------------------------

/// A contact candidate produced by extraction and enriched by generation.
///
/// This is also the payload for upsert-by-email writes: optional fields
/// left as `None` never overwrite stored values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContact {
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub niche: String,
    #[serde(default)]
    pub platform: Platform,
    #[serde(default)]
    pub profile_url: String,
    pub found_date: DateTime<Utc>,
    #[serde(default)]
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_body: Option<String>,
}

/// A stored contact record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: ContactId,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub niche: String,
    #[serde(default)]
    pub platform: Platform,
    #[serde(default)]
    pub profile_url: String,
    pub found_date: DateTime<Utc>,
    #[serde(default)]
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_body: Option<String>,
    #[serde(default)]
    pub email_sent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_sent_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_status: Option<DeliveryStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    /// Build a fresh record from a candidate. The email is lower-cased.
    pub fn from_new(new: NewContact, now: DateTime<Utc>) -> Self {
        Self {
            id: ContactId::new(),
            email: new.email.to_lowercase(),
            name: new.name,
            niche: new.niche,
            platform: new.platform,
            profile_url: new.profile_url,
            found_date: new.found_date,
            snippet: new.snippet,
            email_subject: new.email_subject,
            email_body: new.email_body,
            email_sent: false,
            email_sent_date: None,
            delivery_status: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge a candidate payload over this record (email stays the key).
    pub fn merge_new(&mut self, new: NewContact, now: DateTime<Utc>) {
        self.name = new.name;
        self.niche = new.niche;
        self.platform = new.platform;
        self.profile_url = new.profile_url;
        self.found_date = new.found_date;
        self.snippet = new.snippet;
        if new.email_subject.is_some() {
            self.email_subject = new.email_subject;
        }
        if new.email_body.is_some() {
            self.email_body = new.email_body;
        }
        self.updated_at = now;
    }

    /// Apply a partial update.
    pub fn apply(&mut self, patch: ContactPatch, now: DateTime<Utc>) {
        if let Some(email) = patch.email {
            self.email = email.to_lowercase();
        }
        if let Some(v) = patch.name {
            self.name = v;
        }
        if let Some(v) = patch.niche {
            self.niche = v;
        }
        if let Some(v) = patch.platform {
            self.platform = v;
        }
        if let Some(v) = patch.profile_url {
            self.profile_url = v;
        }
        if let Some(v) = patch.snippet {
            self.snippet = v;
        }
        if let Some(v) = patch.email_subject {
            self.email_subject = Some(v);
        }
        if let Some(v) = patch.email_body {
            self.email_body = Some(v);
        }
        if let Some(v) = patch.email_sent {
            self.email_sent = v;
        }
        if let Some(v) = patch.email_sent_date {
            self.email_sent_date = Some(v);
        }
        if let Some(v) = patch.delivery_status {
            self.delivery_status = Some(v);
        }
        if let Some(v) = patch.notes {
            self.notes = Some(v);
        }
        self.updated_at = now;
    }

    /// Whether generated content is present and non-empty.
    pub fn has_generated_content(&self) -> bool {
        matches!(
            (&self.email_subject, &self.email_body),
            (Some(s), Some(b)) if !s.trim().is_empty() && !b.trim().is_empty()
        )
    }
}

/// Partial update for a stored contact. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub niche: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_sent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_sent_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_status: Option<DeliveryStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}
