//! Contact extraction from annotated search hits.
//!
//! Pure functions: no I/O, no clock reads except the timestamp passed in.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use outreach_shared::{NewContact, Platform, SearchHit};
use regex::Regex;
use url::Url;

/// Maximum snippet length kept on a contact.
const SNIPPET_MAX_CHARS: usize = 200;

/// Candidate pattern used to scan free text.
static EMAIL_SCAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9._-]+@[a-zA-Z0-9._-]+\.[a-zA-Z0-9_-]+").expect("valid email scan regex")
});

/// Strict shape a candidate must have to be kept.
static EMAIL_VALID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
});

/// Whether `email` has a plausible `local@domain.tld` shape.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_VALID_RE.is_match(email)
}

/// All valid addresses in `text`, in order of appearance, without exact repeats.
pub fn extract_emails(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    EMAIL_SCAN_RE
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|e| seen.insert(*e))
        .filter(|e| is_valid_email(e))
        .map(str::to_string)
        .collect()
}

/// Detect the social platform a profile URL belongs to.
pub fn platform_from_url(url: &str) -> Platform {
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase));

    let matches = |domain: &str| match &host {
        Some(h) => h == domain || h.ends_with(&format!(".{domain}")),
        None => url.to_lowercase().contains(domain),
    };

    if matches("instagram.com") {
        Platform::Instagram
    } else if matches("facebook.com") {
        Platform::Facebook
    } else if matches("x.com") || matches("twitter.com") {
        Platform::X
    } else {
        Platform::Unknown
    }
}

/// Business name guess: the title up to the first `-`, `|`, `•` or `@`.
pub fn business_name(title: &str) -> String {
    title
        .split(['-', '|', '•', '@'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Turn search hits into contact candidates.
///
/// Emails are lower-cased and deduplicated across the whole batch; the first
/// hit that mentions an address wins.
pub fn process_search_results(hits: &[SearchHit], found_at: DateTime<Utc>) -> Vec<NewContact> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut contacts = Vec::new();

    for hit in hits {
        let combined = format!("{} {} {}", hit.title, hit.snippet, hit.url);
        for email in extract_emails(&combined) {
            let email = email.to_lowercase();
            if !seen.insert(email.clone()) {
                continue;
            }
            contacts.push(NewContact {
                email,
                name: business_name(&hit.title),
                niche: hit.niche.clone(),
                platform: platform_from_url(&hit.url),
                profile_url: hit.url.clone(),
                found_date: found_at,
                snippet: hit.snippet.chars().take(SNIPPET_MAX_CHARS).collect(),
                email_subject: None,
                email_body: None,
            });
        }
    }

    tracing::info!(hits = hits.len(), contacts = contacts.len(), "extracted unique emails");
    contacts
}
