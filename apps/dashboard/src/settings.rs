//! Flat `KEY: value` view of the config, as the settings form expects.
//!
//! Secrets are not part of the view; the form only sees which env vars hold
//! them.

use std::collections::BTreeMap;
use std::str::FromStr;

use outreach_shared::{AppConfig, OutreachError, Result, parse_platform_list};
use serde_json::Value;

pub type FlatSettings = BTreeMap<String, String>;

/// Project `config` onto the form keys.
pub fn flatten(config: &AppConfig) -> FlatSettings {
    let entries = [
        ("GEMINI_API_KEY_ENV", config.gemini.api_key_env.clone()),
        ("GEMINI_MODEL", config.gemini.model.clone()),
        ("SERPAPI_KEY_ENV", config.serpapi.api_key_env.clone()),
        ("SMTP_HOST", config.smtp.host.clone()),
        ("SMTP_PORT", config.smtp.port.to_string()),
        ("SMTP_SECURE", config.smtp.secure.to_string()),
        ("SMTP_USER", config.smtp.user.clone()),
        ("SMTP_PASS_ENV", config.smtp.password_env.clone()),
        ("YOUR_NAME", config.business.name.clone()),
        ("YOUR_EMAIL", config.business.email.clone()),
        ("YOUR_COMPANY", config.business.company.clone()),
        ("YOUR_WEBSITE", config.business.website.clone()),
        ("DEFAULT_EMAIL_SUBJECT", config.email_template.default_subject.clone()),
        ("DEFAULT_EMAIL_BODY", config.email_template.default_body.clone()),
        ("EMAIL_GENERATION_PROMPT", config.email_template.generation_prompt.clone()),
        ("SOCIAL_PLATFORMS", config.search.platforms.join(",")),
        ("MAX_SEARCHES_PER_RUN", config.search.max_searches_per_run.to_string()),
        ("RESULTS_PER_PAGE", config.search.results_per_page.to_string()),
        ("MAX_PAGES_PER_SEARCH", config.search.max_pages_per_search.to_string()),
        ("SEARCH_DELAY", config.rate_limit.search_delay_ms.to_string()),
        ("EMAIL_DELAY", config.rate_limit.email_delay_ms.to_string()),
        ("MAX_EMAILS_PER_RUN", config.rate_limit.max_emails_per_run.to_string()),
    ];
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Apply submitted form values. Absent keys keep their current value;
/// unknown keys are ignored.
pub fn apply(config: &mut AppConfig, form: &BTreeMap<String, Value>) -> Result<()> {
    for (key, value) in form {
        let raw = match value {
            Value::String(s) => s.trim().to_string(),
            Value::Null => continue,
            other => other.to_string(),
        };
        match key.as_str() {
            "GEMINI_API_KEY_ENV" => config.gemini.api_key_env = raw,
            "GEMINI_MODEL" => config.gemini.model = raw,
            "SERPAPI_KEY_ENV" => config.serpapi.api_key_env = raw,
            "SMTP_HOST" => config.smtp.host = raw,
            "SMTP_PORT" => config.smtp.port = number(key, &raw)?,
            "SMTP_SECURE" => config.smtp.secure = raw.eq_ignore_ascii_case("true"),
            "SMTP_USER" => config.smtp.user = raw,
            "SMTP_PASS_ENV" => config.smtp.password_env = raw,
            "YOUR_NAME" => config.business.name = raw,
            "YOUR_EMAIL" => config.business.email = raw,
            "YOUR_COMPANY" => config.business.company = raw,
            "YOUR_WEBSITE" => config.business.website = raw,
            "DEFAULT_EMAIL_SUBJECT" => config.email_template.default_subject = raw,
            "DEFAULT_EMAIL_BODY" => config.email_template.default_body = raw,
            "EMAIL_GENERATION_PROMPT" => config.email_template.generation_prompt = raw,
            "SOCIAL_PLATFORMS" => config.search.platforms = parse_platform_list(&raw),
            "MAX_SEARCHES_PER_RUN" => config.search.max_searches_per_run = number(key, &raw)?,
            "RESULTS_PER_PAGE" => config.search.results_per_page = number(key, &raw)?,
            "MAX_PAGES_PER_SEARCH" => config.search.max_pages_per_search = number(key, &raw)?,
            "SEARCH_DELAY" => config.rate_limit.search_delay_ms = number(key, &raw)?,
            "EMAIL_DELAY" => config.rate_limit.email_delay_ms = number(key, &raw)?,
            "MAX_EMAILS_PER_RUN" => config.rate_limit.max_emails_per_run = number(key, &raw)?,
            _ => {}
        }
    }
    Ok(())
}

fn number<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| OutreachError::validation(format!("{key} must be a non-negative number, got {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form(value: Value) -> BTreeMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn flatten_exposes_defaults() {
        let flat = flatten(&AppConfig::default());
        assert_eq!(flat["SMTP_HOST"], "smtp.gmail.com");
        assert_eq!(flat["SMTP_PORT"], "587");
        assert_eq!(flat["MAX_EMAILS_PER_RUN"], "10");
        assert_eq!(flat["SOCIAL_PLATFORMS"], "instagram.com,facebook.com");
        assert!(!flat.contains_key("SMTP_PASS"));
    }

    #[test]
    fn apply_accepts_strings_and_numbers() {
        let mut config = AppConfig::default();
        apply(
            &mut config,
            &form(json!({
                "SMTP_PORT": "465",
                "SMTP_SECURE": true,
                "MAX_EMAILS_PER_RUN": 25,
                "YOUR_NAME": "  Ada  ",
                "SOCIAL_PLATFORMS": "instagram.com, x.com",
                "SOMETHING_ELSE": "ignored"
            })),
        )
        .unwrap();

        assert_eq!(config.smtp.port, 465);
        assert!(config.smtp.secure);
        assert_eq!(config.rate_limit.max_emails_per_run, 25);
        assert_eq!(config.business.name, "Ada");
        assert_eq!(config.search.platforms, vec!["instagram.com", "x.com"]);
        // Untouched keys keep their values.
        assert_eq!(config.smtp.host, "smtp.gmail.com");
    }

    #[test]
    fn bad_number_is_validation_error() {
        let mut config = AppConfig::default();
        let err = apply(&mut config, &form(json!({ "SMTP_PORT": "abc" }))).unwrap_err();
        assert!(matches!(err, OutreachError::Validation { .. }));
    }
}
