//! End-to-end outreach pipeline: search → extract → generate → save → send.
//!
//! [`Pipeline`] owns the providers and both stores. The CLI drives
//! [`Pipeline::run_full`]; the dashboard drives the per-stage methods.

use std::sync::Arc;
use std::time::Instant;

use outreach_compose::{Composer, EmailTarget, GeminiClient};
use outreach_mailer::{MailTransport, SmtpMailer};
use outreach_search::{SearchProvider, SerpApiClient};
use outreach_shared::{
    AppConfig, BusinessConfig, Contact, ContactPatch, NewContact, OutreachError, Result,
    SearchHit, SearchParams,
};
use outreach_storage::{CheckpointStage, CheckpointStore, ContactStore};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::progress::{ProgressReporter, SilentProgress};
use crate::recovery::{RecoveryPrompt, StartMode, resolve_start};
use crate::stages::{
    SearchLimits, SendDetail, SendReport, StageDelays, extract_stage, generate_stage,
    search_stage, send_stage,
};

/// The external services a pipeline talks to.
#[derive(Clone)]
pub struct Providers {
    pub search: Arc<dyn SearchProvider>,
    pub composer: Composer,
    pub mailer: Arc<dyn MailTransport>,
}

impl Providers {
    /// Production providers: SerpAPI, Gemini and SMTP, keys from the environment.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let search = SerpApiClient::from_config(config)?;
        let generator = GeminiClient::from_config(config)?;
        let mailer = SmtpMailer::from_config(config)?;
        Ok(Self {
            search: Arc::new(search),
            composer: Composer::new(
                Arc::new(generator),
                config.business.clone(),
                config.email_template.clone(),
            ),
            mailer: Arc::new(mailer),
        })
    }
}

/// Knobs the pipeline reads from config.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub limits: SearchLimits,
    pub delays: StageDelays,
    pub max_emails_per_run: usize,
    pub business: BusinessConfig,
    pub clear_on_complete: bool,
    pub retry_warning_threshold: u32,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            limits: SearchLimits::from_config(&config.search),
            delays: StageDelays::from_config(&config.rate_limit),
            max_emails_per_run: config.rate_limit.max_emails_per_run,
            business: config.business.clone(),
            clear_on_complete: config.recovery.clear_on_complete,
            retry_warning_threshold: config.recovery.retry_warning_threshold,
        }
    }
}

/// Counts reported at the end of a full run.
///
/// Stage counts are `None` when the stage was skipped on resume.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub resumed: bool,
    pub search_results: Option<usize>,
    pub extracted: Option<usize>,
    pub generated: usize,
    pub saved: usize,
    pub unsent: usize,
    pub send: SendReport,
    #[serde(skip)]
    pub elapsed: std::time::Duration,
}

/// How a full run ended.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The operator chose to exit at the recovery prompt.
    Aborted,
    /// Search returned nothing; the run stays unstarted.
    NoSearchResults,
    /// No emails could be extracted; the search checkpoint is kept.
    NoContacts,
    Completed(RunSummary),
}

/// Orchestrates stages over shared stores.
#[derive(Clone)]
pub struct Pipeline {
    providers: Providers,
    contacts: Arc<ContactStore>,
    checkpoints: CheckpointStore,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        providers: Providers,
        contacts: Arc<ContactStore>,
        checkpoints: CheckpointStore,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            providers,
            contacts,
            checkpoints,
            settings,
        }
    }

    /// Production wiring from config.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(
            Providers::from_config(config)?,
            Arc::new(ContactStore::open(config.paths.contacts_file())),
            CheckpointStore::new(config.paths.recovery_path()),
            PipelineSettings::from_config(config),
        ))
    }

    pub fn contacts(&self) -> &Arc<ContactStore> {
        &self.contacts
    }

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    // -----------------------------------------------------------------------
    // Full run
    // -----------------------------------------------------------------------

    /// Run every stage, resuming an interrupted run if the prompt agrees.
    ///
    /// `params` may be `None` only when resuming past the search stage.
    /// Given params are validated before checkpoints are touched or the mail
    /// transport is contacted. Verification failure aborts before any search
    /// traffic.
    #[instrument(skip_all)]
    pub async fn run_full(
        &self,
        params: Option<&SearchParams>,
        prompt: &dyn RecoveryPrompt,
        progress: &dyn ProgressReporter,
    ) -> Result<RunOutcome> {
        if let Some(params) = params {
            params.validate()?;
        }
        let start = Instant::now();

        progress.phase("Checking for interrupted runs");
        let available = match resolve_start(
            &self.checkpoints,
            prompt,
            self.settings.retry_warning_threshold,
        )
        .await?
        {
            StartMode::Abort => return Ok(RunOutcome::Aborted),
            StartMode::Fresh => None,
            StartMode::Resume(available) => Some(available),
        };
        let mut summary = RunSummary {
            resumed: available.is_some(),
            ..Default::default()
        };

        progress.phase("Verifying mail transport");
        self.providers.mailer.verify().await?;

        // Resume works backwards from the latest snapshot on disk; an
        // unreadable snapshot sends us back one stage further.
        let available = available.unwrap_or_default();
        let mut generated: Option<Vec<NewContact>> = None;
        let mut extracted: Option<Vec<NewContact>> = None;
        let mut hits: Option<Vec<SearchHit>> = None;
        if available.generated_emails {
            generated = self.checkpoints.load_checkpoint(CheckpointStage::GeneratedEmails).await?;
        }
        if generated.is_none() && available.extracted_clients {
            extracted = self.checkpoints.load_checkpoint(CheckpointStage::ExtractedClients).await?;
        }
        if generated.is_none() && extracted.is_none() && available.search_results {
            hits = self.checkpoints.load_checkpoint(CheckpointStage::SearchResults).await?;
        }

        // A resume without params drafts for the country the run searched.
        let country = match params {
            Some(p) => Some(p.country.clone()),
            None => self.checkpoints.run_metadata().await?.and_then(|m| m.country),
        }
        .filter(|c| !c.trim().is_empty());
        let country = country.as_deref();

        let generated = match generated {
            Some(generated) => {
                info!(count = generated.len(), "loaded generated emails from checkpoint");
                generated
            }
            None => {
                let extracted = match extracted {
                    Some(extracted) => {
                        info!(count = extracted.len(), "loaded extracted contacts from checkpoint");
                        extracted
                    }
                    None => {
                        let hits = match hits {
                            Some(hits) => {
                                info!(count = hits.len(), "loaded search results from checkpoint");
                                hits
                            }
                            None => {
                                let params = params.ok_or_else(|| {
                                    OutreachError::validation(
                                        "search parameters are required to start a new run",
                                    )
                                })?;
                                let hits = self.search(params, progress).await?;
                                if hits.is_empty() {
                                    warn!("no search results, ending run");
                                    return Ok(RunOutcome::NoSearchResults);
                                }
                                summary.search_results = Some(hits.len());
                                hits
                            }
                        };

                        let extracted = self.extract(&hits, progress).await?;
                        if extracted.is_empty() {
                            warn!("no emails extracted, ending run");
                            return Ok(RunOutcome::NoContacts);
                        }
                        summary.extracted = Some(extracted.len());
                        extracted
                    }
                };
                self.generate(extracted, country, progress).await?
            }
        };
        summary.generated = generated.len();

        progress.phase("Saving contacts");
        summary.saved = self.contacts.upsert_many(generated).await?.len();

        let unsent = self.contacts.list_unsent().await?;
        summary.unsent = unsent.len();
        if unsent.is_empty() {
            info!("every stored contact has already been emailed");
        } else {
            progress.phase("Sending emails");
            summary.send = send_stage(
                self.providers.mailer.as_ref(),
                &self.contacts,
                &self.settings.business,
                &unsent,
                self.settings.max_emails_per_run,
                &self.settings.delays,
                progress,
            )
            .await;
        }

        self.mark_complete().await?;
        summary.elapsed = start.elapsed();
        progress.finish(&format!(
            "Sent {}, failed {}",
            summary.send.sent, summary.send.failed
        ));
        info!(
            generated = summary.generated,
            sent = summary.send.sent,
            failed = summary.send.failed,
            elapsed_ms = summary.elapsed.as_millis(),
            "full run complete"
        );
        Ok(RunOutcome::Completed(summary))
    }

    // -----------------------------------------------------------------------
    // Individual stages (checkpointed)
    // -----------------------------------------------------------------------

    /// Search every platform and checkpoint the hits when there are any.
    pub async fn search(
        &self,
        params: &SearchParams,
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<SearchHit>> {
        progress.phase("Searching");
        let hits = search_stage(
            self.providers.search.as_ref(),
            params,
            &self.settings.limits,
            &self.settings.delays,
            progress,
        )
        .await?;
        if !hits.is_empty() {
            self.checkpoints
                .save_checkpoint(CheckpointStage::SearchResults, &hits)
                .await?;
            self.checkpoints.record_country(&params.country).await?;
        }
        progress.finish(&format!("Found {} search results", hits.len()));
        Ok(hits)
    }

    /// Extract candidates and checkpoint them when there are any.
    pub async fn extract(
        &self,
        hits: &[SearchHit],
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<NewContact>> {
        progress.phase("Extracting emails");
        let extracted = extract_stage(hits);
        if !extracted.is_empty() {
            self.checkpoints
                .save_checkpoint(CheckpointStage::ExtractedClients, &extracted)
                .await?;
        }
        progress.finish(&format!("Extracted {} unique emails", extracted.len()));
        Ok(extracted)
    }

    /// Draft messages for `candidates` and checkpoint the result.
    pub async fn generate(
        &self,
        candidates: Vec<NewContact>,
        country: Option<&str>,
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<NewContact>> {
        progress.phase("Generating emails");
        let generated = generate_stage(
            &self.providers.composer,
            candidates,
            country,
            &self.settings.delays,
            progress,
        )
        .await;
        self.checkpoints
            .save_checkpoint(CheckpointStage::GeneratedEmails, &generated)
            .await?;
        progress.finish(&format!("Generated {} emails", generated.len()));
        Ok(generated)
    }

    /// Wizard step 1: search and extract, then save the candidates.
    ///
    /// Always starts a new run.
    #[instrument(skip_all, fields(niche = %params.niche))]
    pub async fn search_and_extract(
        &self,
        params: &SearchParams,
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<NewContact>> {
        params.validate()?;
        self.checkpoints.clear_checkpoints().await?;
        let hits = self.search(params, progress).await?;
        let extracted = self.extract(&hits, progress).await?;
        self.contacts.upsert_many(extracted.clone()).await?;
        Ok(extracted)
    }

    /// Wizard step 2: generate and save.
    pub async fn generate_and_save(
        &self,
        candidates: Vec<NewContact>,
        country: Option<&str>,
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<NewContact>> {
        let generated = self.generate(candidates, country, progress).await?;
        self.contacts.upsert_many(generated.clone()).await?;
        Ok(generated)
    }

    /// Wizard step 4: send the stored, still-unsent records for `generated`.
    pub async fn send_generated(
        &self,
        generated: &[NewContact],
        progress: &dyn ProgressReporter,
    ) -> Result<SendReport> {
        let mut targets = Vec::with_capacity(generated.len());
        for candidate in generated {
            match self.contacts.find_by_email(&candidate.email).await? {
                Some(contact) if !contact.email_sent => targets.push(contact),
                Some(_) => {}
                None => warn!(email = %candidate.email, "generated contact missing from store"),
            }
        }

        progress.phase("Sending emails");
        let report = self.send_batch(&targets, self.settings.max_emails_per_run, progress).await;
        self.mark_complete().await?;
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Store-driven operations
    // -----------------------------------------------------------------------

    /// Send up to `count` unsent contacts, bounded by the per-run cap.
    pub async fn send_unsent(
        &self,
        count: usize,
        progress: &dyn ProgressReporter,
    ) -> Result<SendReport> {
        progress.phase("Verifying mail transport");
        self.providers.mailer.verify().await?;

        let unsent = self.contacts.list_unsent().await?;
        let max = count.min(self.settings.max_emails_per_run);
        progress.phase("Sending emails");
        Ok(self.send_batch(&unsent, max, progress).await)
    }

    /// Redraft subject and body for every stored contact.
    #[instrument(skip_all)]
    pub async fn regenerate_all(&self, progress: &dyn ProgressReporter) -> Result<usize> {
        let all = self.contacts.list_all().await?;
        let total = all.len();
        progress.phase("Regenerating emails");

        let mut updated = 0;
        for (i, contact) in all.iter().enumerate() {
            progress.item(&contact.email, i + 1, total);
            match self.redraft(contact, None).await {
                Ok(_) => updated += 1,
                Err(e) => warn!(email = %contact.email, error = %e, "failed to save regenerated email"),
            }
            if i + 1 < total && !self.settings.delays.generation.is_zero() {
                tokio::time::sleep(self.settings.delays.generation).await;
            }
        }

        progress.finish(&format!("Regenerated {updated} emails"));
        info!(updated, total, "regeneration complete");
        Ok(updated)
    }

    /// Redraft one stored contact.
    pub async fn regenerate_one(&self, id: &str) -> Result<Contact> {
        let contact = self
            .contacts
            .find_by_id(id)
            .await?
            .ok_or_else(|| OutreachError::not_found("contact", id))?;
        self.redraft(&contact, None).await
    }

    /// Send one stored contact's drafted message, regardless of its sent flag.
    pub async fn send_one(&self, id: &str) -> Result<SendDetail> {
        let contact = self
            .contacts
            .find_by_id(id)
            .await?
            .ok_or_else(|| OutreachError::not_found("contact", id))?;
        self.providers.mailer.verify().await?;

        let report = self
            .send_batch(std::slice::from_ref(&contact), 1, &SilentProgress)
            .await;
        report
            .details
            .into_iter()
            .next()
            .ok_or_else(|| OutreachError::Mail(format!("no send attempt for {}", contact.email)))
    }

    /// Mark the current run complete, clearing checkpoints when configured to.
    pub async fn mark_complete(&self) -> Result<()> {
        self.checkpoints.mark_run_complete().await?;
        if self.settings.clear_on_complete {
            self.checkpoints.clear_checkpoints().await?;
        }
        Ok(())
    }

    async fn send_batch(
        &self,
        contacts: &[Contact],
        max: usize,
        progress: &dyn ProgressReporter,
    ) -> SendReport {
        send_stage(
            self.providers.mailer.as_ref(),
            &self.contacts,
            &self.settings.business,
            contacts,
            max,
            &self.settings.delays,
            progress,
        )
        .await
    }

    async fn redraft(&self, contact: &Contact, country: Option<&str>) -> Result<Contact> {
        let email = self
            .providers
            .composer
            .compose(EmailTarget::from(contact), country)
            .await;
        self.contacts
            .update(
                contact.id.as_str(),
                ContactPatch {
                    email_subject: Some(email.subject),
                    email_body: Some(email.body),
                    ..Default::default()
                },
            )
            .await
    }
}
