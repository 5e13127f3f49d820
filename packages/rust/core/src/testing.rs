//! In-memory providers that count their calls.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use outreach_compose::{Composer, TextGenerator};
use outreach_mailer::{MailReceipt, MailTransport, OutgoingMail};
use outreach_search::SearchProvider;
use outreach_shared::{
    BusinessConfig, EmailTemplateConfig, NewContact, OutreachError, Platform, Result, SearchResult,
};

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

enum SearchMode {
    Pages(Mutex<VecDeque<Vec<SearchResult>>>),
    FailFirst(String),
    PagesThenFail(Mutex<VecDeque<Vec<SearchResult>>>, Mutex<Option<String>>),
    Endless,
}

pub struct StubSearch {
    mode: SearchMode,
    starts: Mutex<Vec<u32>>,
}

impl StubSearch {
    /// Serve `pages` in order, then empty pages forever.
    pub fn with_pages(pages: Vec<Vec<SearchResult>>) -> Self {
        Self {
            mode: SearchMode::Pages(Mutex::new(pages.into())),
            starts: Mutex::new(Vec::new()),
        }
    }

    /// Fail the first call with `message`, then serve empty pages.
    pub fn failing_first(message: &str) -> Self {
        Self {
            mode: SearchMode::FailFirst(message.to_string()),
            starts: Mutex::new(Vec::new()),
        }
    }

    /// Serve `pages` in order, fail the next call with `message`, then serve
    /// empty pages.
    pub fn pages_then_failing(pages: Vec<Vec<SearchResult>>, message: &str) -> Self {
        Self {
            mode: SearchMode::PagesThenFail(
                Mutex::new(pages.into()),
                Mutex::new(Some(message.to_string())),
            ),
            starts: Mutex::new(Vec::new()),
        }
    }

    /// Every call returns one result.
    pub fn endless() -> Self {
        Self {
            mode: SearchMode::Endless,
            starts: Mutex::new(Vec::new()),
        }
    }

    pub fn result(title: &str, snippet: &str, url: &str) -> SearchResult {
        SearchResult {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
        }
    }

    pub fn calls(&self) -> usize {
        self.starts.lock().unwrap().len()
    }

    pub fn starts(&self) -> Vec<u32> {
        self.starts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for StubSearch {
    async fn search(&self, _query: &str, start: u32, _num: u32) -> Result<Vec<SearchResult>> {
        let call = {
            let mut starts = self.starts.lock().unwrap();
            starts.push(start);
            starts.len()
        };
        match &self.mode {
            SearchMode::Pages(pages) => Ok(pages.lock().unwrap().pop_front().unwrap_or_default()),
            SearchMode::FailFirst(message) if call == 1 => Err(OutreachError::Provider(message.clone())),
            SearchMode::FailFirst(_) => Ok(Vec::new()),
            SearchMode::PagesThenFail(pages, failure) => {
                if let Some(page) = pages.lock().unwrap().pop_front() {
                    return Ok(page);
                }
                match failure.lock().unwrap().take() {
                    Some(message) => Err(OutreachError::Provider(message)),
                    None => Ok(Vec::new()),
                }
            }
            SearchMode::Endless => Ok(vec![Self::result(
                "Endless",
                &format!("e{call}@endless.com"),
                "https://instagram.com/endless",
            )]),
        }
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

pub struct StubGenerator {
    reply: String,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl StubGenerator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }
}

pub fn composer_with(reply: &str) -> (Arc<StubGenerator>, Composer) {
    let generator = Arc::new(StubGenerator {
        reply: reply.to_string(),
        calls: AtomicUsize::new(0),
        prompts: Mutex::new(Vec::new()),
    });
    let composer = Composer::new(generator.clone(), business(), EmailTemplateConfig::default());
    (generator, composer)
}

// ---------------------------------------------------------------------------
// Mail
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct StubMailer {
    fail_for: Vec<String>,
    unreachable: bool,
    sent: Mutex<Vec<OutgoingMail>>,
}

impl StubMailer {
    pub fn failing_for(emails: &[&str]) -> Self {
        Self {
            fail_for: emails.iter().map(|e| e.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Default::default()
        }
    }

    pub fn attempts(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl MailTransport for StubMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<MailReceipt> {
        let n = {
            let mut sent = self.sent.lock().unwrap();
            sent.push(mail.clone());
            sent.len()
        };
        if self.fail_for.iter().any(|e| e == &mail.to) {
            return Err(OutreachError::Mail("mailbox unavailable".into()));
        }
        Ok(MailReceipt {
            message_id: format!("<stub-{n}@test>"),
        })
    }

    async fn verify(&self) -> Result<()> {
        if self.unreachable {
            Err(OutreachError::Mail("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn business() -> BusinessConfig {
    BusinessConfig {
        name: "Ada".into(),
        email: "ada@ada.dev".into(),
        website: "https://ada.dev".into(),
        company: "Ada Web".into(),
    }
}

pub fn candidate(email: &str) -> NewContact {
    NewContact {
        email: email.into(),
        name: "Bloom".into(),
        niche: "Florist".into(),
        platform: Platform::Instagram,
        profile_url: "https://instagram.com/bloom".into(),
        found_date: Utc::now(),
        snippet: String::new(),
        email_subject: None,
        email_body: None,
    }
}
