//! Outreach message drafting.
//!
//! A [`TextGenerator`] turns a prompt into free text; [`Composer`] builds the
//! prompt, parses the `SUBJECT:` / `BODY:` reply and falls back to a fixed
//! template whenever generation or parsing fails.

mod gemini;
mod prompt;

use std::sync::Arc;

use async_trait::async_trait;
use outreach_shared::{BusinessConfig, Contact, EmailTemplateConfig, NewContact, Platform, Result};
use tracing::{debug, warn};

pub use gemini::{GeminiClient, GeminiOptions};
pub use prompt::{build_prompt, fallback_email, parse_generated};

/// A text-generation backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// A drafted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedEmail {
    pub subject: String,
    pub body: String,
}

/// The contact fields a prompt needs.
#[derive(Debug, Clone, Copy)]
pub struct EmailTarget<'a> {
    pub email: &'a str,
    pub name: &'a str,
    pub niche: &'a str,
    pub platform: Platform,
}

impl<'a> From<&'a NewContact> for EmailTarget<'a> {
    fn from(c: &'a NewContact) -> Self {
        Self {
            email: &c.email,
            name: &c.name,
            niche: &c.niche,
            platform: c.platform,
        }
    }
}

impl<'a> From<&'a Contact> for EmailTarget<'a> {
    fn from(c: &'a Contact) -> Self {
        Self {
            email: &c.email,
            name: &c.name,
            niche: &c.niche,
            platform: c.platform,
        }
    }
}

/// Drafts messages for contacts. Never fails: errors become the fallback.
#[derive(Clone)]
pub struct Composer {
    generator: Arc<dyn TextGenerator>,
    business: BusinessConfig,
    template: EmailTemplateConfig,
}

impl Composer {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        business: BusinessConfig,
        template: EmailTemplateConfig,
    ) -> Self {
        Self {
            generator,
            business,
            template,
        }
    }

    /// Draft a message for `target`. `country` is the search country, if known.
    pub async fn compose(&self, target: EmailTarget<'_>, country: Option<&str>) -> GeneratedEmail {
        let prompt = build_prompt(&target, &self.business, country, &self.template.generation_prompt);

        match self.generator.generate(&prompt).await {
            Ok(text) => match parse_generated(&text) {
                Some(email) => {
                    debug!(email = target.email, "generated message");
                    email
                }
                None => {
                    warn!(email = target.email, "unparseable generation output, using fallback");
                    fallback_email(&target, &self.business, &self.template)
                }
            },
            Err(e) => {
                warn!(email = target.email, error = %e, "generation failed, using fallback");
                fallback_email(&target, &self.business, &self.template)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outreach_shared::OutreachError;
    use std::sync::Mutex;

    struct Canned {
        reply: Result<String>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextGenerator for Canned {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Ok(s) => Ok(s.clone()),
                Err(e) => Err(OutreachError::Provider(e.to_string())),
            }
        }
    }

    fn business() -> BusinessConfig {
        BusinessConfig {
            name: "Ada".into(),
            email: "ada@ada.dev".into(),
            website: "https://ada.dev".into(),
            company: "Ada Web".into(),
        }
    }

    fn target() -> EmailTarget<'static> {
        EmailTarget {
            email: "hello@bloom.com",
            name: "Bloom",
            niche: "Florist",
            platform: Platform::Instagram,
        }
    }

    fn composer(reply: Result<String>) -> (Arc<Canned>, Composer) {
        let generator = Arc::new(Canned {
            reply,
            prompts: Mutex::new(Vec::new()),
        });
        let composer = Composer::new(generator.clone(), business(), EmailTemplateConfig::default());
        (generator, composer)
    }

    #[tokio::test]
    async fn labelled_reply_is_parsed() {
        let (generator, composer) =
            composer(Ok("SUBJECT: A site for Bloom\nBODY:\nHi Bloom,\n\nLet's talk.".into()));
        let email = composer.compose(target(), Some("Canada")).await;
        assert_eq!(email.subject, "A site for Bloom");
        assert_eq!(email.body, "Hi Bloom,\n\nLet's talk.");

        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Target Country: Canada"));
    }

    #[tokio::test]
    async fn unlabelled_reply_uses_fallback() {
        let (_g, composer) = composer(Ok("Here is a nice email for you!".into()));
        let email = composer.compose(target(), None).await;
        assert!(!email.subject.is_empty());
        assert!(!email.body.is_empty());
        assert!(email.subject.contains("Florist"));
        assert!(email.body.contains("https://ada.dev"));
    }

    #[tokio::test]
    async fn provider_error_uses_fallback() {
        let (_g, composer) = composer(Err(OutreachError::Provider("quota".into())));
        let email = composer.compose(target(), None).await;
        assert_eq!(email.subject, "Professional Website Development for Your Florist Business");
        assert!(email.body.contains("instagram"));
    }
}
