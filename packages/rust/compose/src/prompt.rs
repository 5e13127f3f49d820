//! Prompt construction, reply parsing and the fallback template.

use std::sync::LazyLock;

use outreach_shared::{BusinessConfig, EmailTemplateConfig};
use regex::Regex;

use crate::{EmailTarget, GeneratedEmail};

static SUBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)SUBJECT:\s*(.+)").expect("valid subject regex"));

static BODY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)BODY:\s*(.+)").expect("valid body regex"));

/// Build the generation prompt for one contact.
///
/// `extra_instructions` is appended verbatim when non-empty.
pub fn build_prompt(
    target: &EmailTarget<'_>,
    business: &BusinessConfig,
    country: Option<&str>,
    extra_instructions: &str,
) -> String {
    let name = if target.name.trim().is_empty() {
        "Business Owner"
    } else {
        target.name
    };
    let country = country.filter(|c| !c.trim().is_empty()).unwrap_or("Global");
    let platform = target.platform.as_str();
    let niche = target.niche;

    let mut prompt = format!(
        "You are a professional web development service provider writing a personalized outreach email.

Client Information:
- Business Name: {name}
- Niche/Industry: {niche}
- Platform: {platform}
- Context: Found their contact on {platform}
- Target Country: {country}

Your Information:
- Name: {}
- Company: {}
- Website: {}
- Email: {}

Write a professional, polite, and attractive email that:
1. Has a compelling subject line (max 60 characters)
2. Addresses them professionally (use their business name if available)
3. Briefly mentions you found them on {platform}
4. Highlights the value of having a professional website for their {niche} business
5. Mentions 2-3 specific benefits (online presence, customer reach, credibility)
6. Naturally includes your website URL: {}
7. Has a clear but non-pushy call-to-action
8. Keeps the tone warm, professional, and respectful
9. Is concise (200-300 words max)
10. Signs off with your name and company
",
        business.name, business.company, business.website, business.email, business.website,
    );

    let extra = extra_instructions.trim();
    if !extra.is_empty() {
        prompt.push_str("\nAdditional instructions:\n");
        prompt.push_str(extra);
        prompt.push('\n');
    }

    prompt.push_str(
        "
Format your response EXACTLY as:
SUBJECT: [subject line here]
BODY:
[email body here]

Do not include any other text or explanations.",
    );
    prompt
}

/// Parse a `SUBJECT: ...` / `BODY: ...` reply. Labels are case-insensitive.
///
/// Returns `None` when either label is missing or its content is blank.
pub fn parse_generated(text: &str) -> Option<GeneratedEmail> {
    let subject = SUBJECT_RE.captures(text)?.get(1)?.as_str().trim();
    let body = BODY_RE.captures(text)?.get(1)?.as_str().trim();
    if subject.is_empty() || body.is_empty() {
        return None;
    }
    Some(GeneratedEmail {
        subject: subject.to_string(),
        body: body.to_string(),
    })
}

/// Template used when generation fails.
///
/// A configured default subject/body replaces the built-in text; `{name}`,
/// `{niche}`, `{platform}` and `{website}` are substituted in both.
pub fn fallback_email(
    target: &EmailTarget<'_>,
    business: &BusinessConfig,
    template: &EmailTemplateConfig,
) -> GeneratedEmail {
    let platform = target.platform.as_str();
    let niche = target.niche;

    let subject = if template.default_subject.trim().is_empty() {
        format!("Professional Website Development for Your {niche} Business")
    } else {
        fill_placeholders(&template.default_subject, target, business)
    };

    let body = if template.default_body.trim().is_empty() {
        format!(
            "Hi,

I came across your profile on {platform} and was impressed by your {niche} business.

In today's digital age, having a professional website can significantly boost your online presence and help you reach more customers. I specialize in creating modern, responsive websites that help businesses like yours grow.

I'd love to discuss how a custom website could benefit your business. You can learn more about my services at {website}.

Would you be interested in a quick chat about your online presence?

Best regards,
{name}
{company}
{website}",
            website = business.website,
            name = business.name,
            company = business.company,
        )
    } else {
        fill_placeholders(&template.default_body, target, business)
    };

    GeneratedEmail { subject, body }
}

fn fill_placeholders(text: &str, target: &EmailTarget<'_>, business: &BusinessConfig) -> String {
    text.replace("{name}", target.name)
        .replace("{niche}", target.niche)
        .replace("{platform}", target.platform.as_str())
        .replace("{website}", &business.website)
}

#[cfg(test)]
mod tests {
    use super::*;
    use outreach_shared::Platform;

    fn business() -> BusinessConfig {
        BusinessConfig {
            name: "Ada".into(),
            email: "ada@ada.dev".into(),
            website: "https://ada.dev".into(),
            company: "Ada Web".into(),
        }
    }

    fn target(name: &'static str) -> EmailTarget<'static> {
        EmailTarget {
            email: "hello@bloom.com",
            name,
            niche: "Florist",
            platform: Platform::Facebook,
        }
    }

    #[test]
    fn prompt_carries_contact_and_sender() {
        let prompt = build_prompt(&target("Bloom"), &business(), Some("Kenya"), "");
        assert!(prompt.contains("- Business Name: Bloom"));
        assert!(prompt.contains("- Niche/Industry: Florist"));
        assert!(prompt.contains("found them on facebook"));
        assert!(prompt.contains("- Company: Ada Web"));
        assert!(prompt.contains("Target Country: Kenya"));
        assert!(prompt.ends_with("Do not include any other text or explanations."));
        assert!(!prompt.contains("Additional instructions"));
    }

    #[test]
    fn prompt_defaults_and_extra_instructions() {
        let prompt = build_prompt(&target(""), &business(), None, "Mention our spring discount.");
        assert!(prompt.contains("- Business Name: Business Owner"));
        assert!(prompt.contains("Target Country: Global"));
        assert!(prompt.contains("Additional instructions:\nMention our spring discount."));
    }

    #[test]
    fn parse_labelled_reply() {
        let text = "subject: Grow Bloom online\nBody:\nHi there,\n\nCheers,\nAda";
        let email = parse_generated(text).expect("parsed");
        assert_eq!(email.subject, "Grow Bloom online");
        assert_eq!(email.body, "Hi there,\n\nCheers,\nAda");
    }

    #[test]
    fn parse_rejects_missing_labels() {
        assert!(parse_generated("Just some text").is_none());
        assert!(parse_generated("SUBJECT: only a subject").is_none());
        assert!(parse_generated("BODY: only a body").is_none());
        assert!(parse_generated("SUBJECT:   \nBODY:   ").is_none());
    }

    #[test]
    fn builtin_fallback() {
        let email = fallback_email(&target("Bloom"), &business(), &EmailTemplateConfig::default());
        assert_eq!(email.subject, "Professional Website Development for Your Florist Business");
        assert!(email.body.starts_with("Hi,\n\nI came across your profile on facebook"));
        assert!(email.body.ends_with("Ada\nAda Web\nhttps://ada.dev"));
    }

    #[test]
    fn configured_fallback_fills_placeholders() {
        let template = EmailTemplateConfig {
            default_subject: "Hello {name}".into(),
            default_body: "A site for your {niche} business: {website}".into(),
            generation_prompt: String::new(),
        };
        let email = fallback_email(&target("Bloom"), &business(), &template);
        assert_eq!(email.subject, "Hello Bloom");
        assert_eq!(email.body, "A site for your Florist business: https://ada.dev");
    }
}
