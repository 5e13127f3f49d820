//! Pipeline stage contracts.
//!
//! Each stage consumes the previous stage's output (or a loaded checkpoint)
//! and returns its own. Provider failures are absorbed here: search errors
//! yield an empty list for that query, generation errors yield the fallback
//! template, send errors are recorded per recipient.

use std::time::Duration;

use chrono::Utc;
use outreach_compose::{Composer, EmailTarget};
use outreach_mailer::{MailTransport, OutgoingMail};
use outreach_search::{SearchProvider, build_search_query, error_hint};
use outreach_shared::{
    BusinessConfig, Contact, ContactPatch, DeliveryStatus, NewContact, RateLimitConfig, Result,
    SearchConfig, SearchHit, SearchParams, SearchResult,
};
use outreach_storage::ContactStore;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::progress::ProgressReporter;

// ---------------------------------------------------------------------------
// Stage settings
// ---------------------------------------------------------------------------

/// Pauses between outbound calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageDelays {
    /// Between platform queries.
    pub search: Duration,
    /// Between result pages of one query.
    pub page: Duration,
    /// Between generation calls.
    pub generation: Duration,
    /// Between sends.
    pub email: Duration,
}

impl StageDelays {
    pub fn from_config(rate: &RateLimitConfig) -> Self {
        Self {
            search: Duration::from_millis(rate.search_delay_ms),
            page: Duration::from_millis(rate.page_delay_ms),
            generation: Duration::from_millis(rate.generation_delay_ms),
            email: Duration::from_millis(rate.email_delay_ms),
        }
    }
}

/// Bounds on search traffic for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    /// Total provider calls allowed per run, across all platforms.
    pub max_searches_per_run: u32,
    pub results_per_page: u32,
    pub max_pages_per_search: u32,
}

impl SearchLimits {
    pub fn from_config(search: &SearchConfig) -> Self {
        Self {
            max_searches_per_run: search.max_searches_per_run,
            results_per_page: search.results_per_page.max(1),
            max_pages_per_search: search.max_pages_per_search,
        }
    }
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self::from_config(&SearchConfig::default())
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Query every platform and annotate the hits with their query context.
///
/// Rejects invalid parameters before any provider call. A failing query is
/// logged and contributes nothing; it never aborts the stage.
#[instrument(skip_all, fields(niche = %params.niche, platforms = params.platforms.len()))]
pub async fn search_stage(
    provider: &dyn SearchProvider,
    params: &SearchParams,
    limits: &SearchLimits,
    delays: &StageDelays,
    progress: &dyn ProgressReporter,
) -> Result<Vec<SearchHit>> {
    params.validate()?;

    let mut budget = limits.max_searches_per_run;
    let mut hits = Vec::new();
    let total = params.platforms.len();

    for (i, platform) in params.platforms.iter().enumerate() {
        if budget == 0 {
            warn!(platform = %platform, "search budget for this run exhausted, skipping");
            break;
        }
        progress.item(platform, i + 1, total);

        let query = build_search_query(platform, &params.niche, &params.country, &params.email_provider);
        let results = fetch_pages(provider, &query, limits, delays, &mut budget).await;
        let searched_at = Utc::now();
        info!(platform = %platform, count = results.len(), "platform search finished");

        hits.extend(results.into_iter().map(|r| SearchHit {
            title: r.title,
            url: r.url,
            snippet: r.snippet,
            niche: params.niche.clone(),
            platform: platform.clone(),
            searched_at,
        }));

        if i + 1 < total {
            pause(delays.search).await;
        }
    }

    info!(total = hits.len(), "search stage complete");
    Ok(hits)
}

/// Page through one query. A provider error stops paging; pages already
/// fetched are kept.
async fn fetch_pages(
    provider: &dyn SearchProvider,
    query: &str,
    limits: &SearchLimits,
    delays: &StageDelays,
    budget: &mut u32,
) -> Vec<SearchResult> {
    let mut all = Vec::new();

    for page in 0..limits.max_pages_per_search {
        if *budget == 0 {
            break;
        }
        *budget -= 1;

        let start = page * limits.results_per_page;
        match provider.search(query, start, limits.results_per_page).await {
            Ok(results) if results.is_empty() => break,
            Ok(results) => all.extend(results),
            Err(e) => {
                let message = e.to_string();
                let kept = all.len();
                match error_hint(&message) {
                    Some(hint) => warn!(%query, page, kept, error = %message, hint, "search query failed"),
                    None => warn!(%query, page, kept, error = %message, "search query failed"),
                }
                break;
            }
        }

        if page + 1 < limits.max_pages_per_search {
            pause(delays.page).await;
        }
    }

    all
}

// ---------------------------------------------------------------------------
// Extract
// ---------------------------------------------------------------------------

/// Pull unique contact candidates out of the search hits.
pub fn extract_stage(hits: &[SearchHit]) -> Vec<NewContact> {
    outreach_extract::process_search_results(hits, Utc::now())
}

// ---------------------------------------------------------------------------
// Generate
// ---------------------------------------------------------------------------

/// Draft a subject and body for every candidate. Never fails the batch.
#[instrument(skip_all, fields(count = candidates.len()))]
pub async fn generate_stage(
    composer: &Composer,
    candidates: Vec<NewContact>,
    country: Option<&str>,
    delays: &StageDelays,
    progress: &dyn ProgressReporter,
) -> Vec<NewContact> {
    let total = candidates.len();
    let mut enriched = Vec::with_capacity(total);

    for (i, mut candidate) in candidates.into_iter().enumerate() {
        progress.item(&candidate.email, i + 1, total);
        let email = composer.compose(EmailTarget::from(&candidate), country).await;
        candidate.email_subject = Some(email.subject);
        candidate.email_body = Some(email.body);
        enriched.push(candidate);

        if i + 1 < total {
            pause(delays.generation).await;
        }
    }

    info!(generated = enriched.len(), "generation stage complete");
    enriched
}

// ---------------------------------------------------------------------------
// Confirm
// ---------------------------------------------------------------------------

/// Accept generated content as-is. Returns how many drafts were accepted.
pub fn confirm_stage(generated: &[NewContact]) -> usize {
    let ready = generated
        .iter()
        .filter(|c| c.email_subject.is_some() && c.email_body.is_some())
        .count();
    info!(ready, "generated content confirmed");
    ready
}

// ---------------------------------------------------------------------------
// Send
// ---------------------------------------------------------------------------

/// Outcome of one send attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendDetail {
    pub email: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Totals for a send batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReport {
    pub sent: usize,
    pub failed: usize,
    pub details: Vec<SendDetail>,
}

impl SendReport {
    pub fn attempted(&self) -> usize {
        self.sent + self.failed
    }
}

/// Send at most `max` messages, sequentially, recording each outcome.
///
/// Store update failures are logged and do not abort the batch.
#[instrument(skip_all, fields(candidates = contacts.len(), max = max))]
pub async fn send_stage(
    mailer: &dyn MailTransport,
    store: &ContactStore,
    business: &BusinessConfig,
    contacts: &[Contact],
    max: usize,
    delays: &StageDelays,
    progress: &dyn ProgressReporter,
) -> SendReport {
    let batch = &contacts[..contacts.len().min(max)];
    let total = batch.len();
    let mut report = SendReport::default();

    info!(total, max, "sending messages");

    for (i, contact) in batch.iter().enumerate() {
        progress.item(&contact.email, i + 1, total);
        let detail = send_one(mailer, business, contact).await;

        let patch = ContactPatch {
            email_sent: Some(detail.success),
            email_sent_date: Some(Utc::now()),
            delivery_status: Some(if detail.success {
                DeliveryStatus::Sent
            } else {
                DeliveryStatus::Failed
            }),
            notes: Some(match (&detail.message_id, &detail.error) {
                (Some(id), _) => format!("Sent: {id}"),
                (None, Some(err)) => format!("Error: {err}"),
                (None, None) => "Error: unknown".to_string(),
            }),
            ..Default::default()
        };
        if let Err(e) = store.update(contact.id.as_str(), patch).await {
            warn!(email = %contact.email, error = %e, "failed to record delivery status");
        }

        if detail.success {
            report.sent += 1;
        } else {
            report.failed += 1;
        }
        report.details.push(detail);

        if i + 1 < total {
            pause(delays.email).await;
        }
    }

    info!(sent = report.sent, failed = report.failed, "send stage complete");
    report
}

async fn send_one(mailer: &dyn MailTransport, business: &BusinessConfig, contact: &Contact) -> SendDetail {
    let (Some(subject), Some(body)) = (&contact.email_subject, &contact.email_body) else {
        warn!(email = %contact.email, "no generated content, skipping");
        return SendDetail {
            email: contact.email.clone(),
            success: false,
            message_id: None,
            error: Some("no generated content".into()),
        };
    };

    let mail = OutgoingMail::from_business(business, &contact.email, subject, body);
    match mailer.send(&mail).await {
        Ok(receipt) => SendDetail {
            email: contact.email.clone(),
            success: true,
            message_id: Some(receipt.message_id),
            error: None,
        },
        Err(e) => {
            warn!(email = %contact.email, error = %e, "send failed");
            SendDetail {
                email: contact.email.clone(),
                success: false,
                message_id: None,
                error: Some(e.to_string()),
            }
        }
    }
}
