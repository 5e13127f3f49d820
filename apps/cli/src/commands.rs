//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use outreach_core::{Pipeline, ProgressReporter, RunOutcome, RunSummary, SendReport};
use outreach_shared::{
    AppConfig, OutreachError, SearchParams, config_file_path, load_config_or_default, parse_platform_list,
    save_config_to, validate_credentials,
};
use outreach_storage::{CheckpointStage, ContactFilter, SentFilter};
use tracing::{error, info};

use crate::prompt::{StdinRecoveryPrompt, ask, is_interactive, is_yes, parse_count};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Outreach: find businesses, draft personal emails, send them.
#[derive(Parser)]
#[command(
    name = "outreach",
    version,
    about = "Search for businesses in a niche, draft outreach emails with AI, and send them over SMTP.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.outreach/outreach.toml).
    #[arg(long, env = "OUTREACH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the full pipeline: search, extract, generate, save, send.
    ///
    /// Offers to resume if a previous run was interrupted.
    Run {
        /// Business niche to search for, e.g. "bakery". Omit to resume.
        #[arg(short, long, requires = "country")]
        niche: Option<String>,

        /// Country used as a search term.
        #[arg(short, long, requires = "niche")]
        country: Option<String>,

        /// Email provider domain to look for.
        #[arg(short, long, default_value = "gmail.com")]
        email_provider: String,

        /// Platforms to search (comma-separated). Defaults to [search] platforms.
        #[arg(short, long)]
        platforms: Option<String>,
    },

    /// Send emails to stored contacts that have not been emailed yet.
    SendUnsent {
        /// How many to send (asked interactively when omitted).
        #[arg(long)]
        count: Option<usize>,
    },

    /// Redraft subject and body for every stored contact.
    Regenerate {
        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Inspect or edit the contact store.
    Contacts {
        #[command(subcommand)]
        action: ContactsAction,
    },

    /// Inspect or clear run checkpoints.
    Checkpoints {
        #[command(subcommand)]
        action: CheckpointsAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Contact subcommands.
#[derive(Subcommand)]
pub(crate) enum ContactsAction {
    /// List stored contacts.
    List {
        /// Only sent or only unsent contacts.
        #[arg(long, value_enum)]
        status: Option<StatusArg>,

        /// Case-insensitive niche substring ("all" disables).
        #[arg(long)]
        niche: Option<String>,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Delete a contact by id.
    Delete {
        id: String,
    },
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum StatusArg {
    Sent,
    Unsent,
}

/// Checkpoint subcommands.
#[derive(Subcommand)]
pub(crate) enum CheckpointsAction {
    /// Show the current run and which stage snapshots exist.
    Status,
    /// Delete every checkpoint and the run record.
    Clear,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "outreach=info",
        1 => "outreach=debug",
        _ => "outreach=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => config_file_path()?,
    };

    match cli.command {
        Command::Run {
            niche,
            country,
            email_provider,
            platforms,
        } => {
            let config = load(&config_path)?;
            let params = niche.map(|niche| SearchParams {
                niche,
                country: country.unwrap_or_default(),
                email_provider,
                platforms: platforms
                    .as_deref()
                    .map(parse_platform_list)
                    .unwrap_or_else(|| config.search.platforms.clone()),
            });
            cmd_run(&config, params.as_ref()).await
        }
        Command::SendUnsent { count } => cmd_send_unsent(&load(&config_path)?, count).await,
        Command::Regenerate { yes } => cmd_regenerate(&load(&config_path)?, yes).await,
        Command::Contacts { action } => {
            let config = load(&config_path)?;
            match action {
                ContactsAction::List {
                    status,
                    niche,
                    json,
                } => cmd_contacts_list(&config, status, niche, json).await,
                ContactsAction::Delete { id } => cmd_contacts_delete(&config, &id).await,
            }
        }
        Command::Checkpoints { action } => {
            let config = load(&config_path)?;
            match action {
                CheckpointsAction::Status => cmd_checkpoints_status(&config).await,
                CheckpointsAction::Clear => cmd_checkpoints_clear(&config).await,
            }
        }
        Command::Config { action } => match action {
            ConfigAction::Init { force } => cmd_config_init(&config_path, force),
            ConfigAction::Show => cmd_config_show(&config_path),
        },
    }
}

fn load(path: &Path) -> Result<AppConfig> {
    Ok(load_config_or_default(path)?)
}

fn pipeline(config: &AppConfig) -> Result<Pipeline> {
    validate_credentials(config)?;
    Ok(Pipeline::from_config(config)?)
}

// ---------------------------------------------------------------------------
// Pipeline commands
// ---------------------------------------------------------------------------

async fn cmd_run(config: &AppConfig, params: Option<&SearchParams>) -> Result<()> {
    let pipeline = pipeline(config)?;

    if let Some(params) = params {
        info!(
            niche = %params.niche,
            country = %params.country,
            platforms = %params.platforms.join(", "),
            "starting full run"
        );
    }

    let reporter = CliProgress::new();
    let prompt = StdinRecoveryPrompt::new(reporter.spinner.clone());
    let outcome = pipeline.run_full(params, &prompt, &reporter).await;
    reporter.clear();

    match outcome {
        Ok(RunOutcome::Aborted) => println!("Returning without changes."),
        Ok(RunOutcome::NoSearchResults) => {
            println!("No search results found. Try a different niche or check your SerpAPI key.")
        }
        Ok(RunOutcome::NoContacts) => println!("No email addresses found in the search results."),
        Ok(RunOutcome::Completed(summary)) => print_run_summary(&summary),
        Err(e) => {
            error!(error = %e, "run failed");
            if !matches!(e, OutreachError::Validation { .. }) {
                eprintln!("Progress has been saved. Run again to resume.");
            }
            return Err(e.into());
        }
    }
    Ok(())
}

fn print_run_summary(summary: &RunSummary) {
    let shown = |n: Option<usize>| n.map_or_else(|| "from checkpoint".to_string(), |n| n.to_string());

    println!();
    println!("  Run complete{}", if summary.resumed { " (resumed)" } else { "" });
    println!("  Search results: {}", shown(summary.search_results));
    println!("  Emails found:   {}", shown(summary.extracted));
    println!("  Drafted:        {}", summary.generated);
    println!("  Saved:          {}", summary.saved);
    if summary.unsent == 0 {
        println!("  Every stored contact has already been emailed.");
    } else {
        print_send_report(&summary.send);
    }
    println!("  Time:           {:.1}s", summary.elapsed.as_secs_f64());
    println!();
}

fn print_send_report(report: &SendReport) {
    println!("  Sent:           {}", report.sent);
    println!("  Failed:         {}", report.failed);
    for detail in report.details.iter().filter(|d| !d.success) {
        println!(
            "    {}: {}",
            detail.email,
            detail.error.as_deref().unwrap_or("unknown error")
        );
    }
}

async fn cmd_send_unsent(config: &AppConfig, count: Option<usize>) -> Result<()> {
    let pipeline = pipeline(config)?;
    let total = pipeline.contacts().list_unsent().await?.len();
    if total == 0 {
        println!("No unsent emails. Every contact has been emailed.");
        return Ok(());
    }

    let per_run = pipeline.settings().max_emails_per_run;
    let max = total.min(per_run);
    println!("Unsent emails: {total}. You can send up to {max} (limit {per_run} per run).");

    let count = match count {
        Some(n) if (1..=max).contains(&n) => n,
        Some(n) => return Err(eyre!("count {n} is out of range 1-{max}")),
        None => {
            if !is_interactive() {
                return Err(eyre!("refusing to run non-interactively without --count"));
            }
            let answer = ask(&format!("How many emails do you want to send? (1-{max}): "))?
                .unwrap_or_default();
            parse_count(&answer, max)
                .ok_or_else(|| eyre!("invalid number, expected 1-{max}"))?
        }
    };

    let reporter = CliProgress::new();
    let report = pipeline.send_unsent(count, &reporter).await;
    reporter.clear();
    let report = report?;

    println!();
    println!("  Attempted:      {}", report.attempted());
    print_send_report(&report);
    println!("  Remaining:      {}", total - report.sent);
    println!();
    Ok(())
}

async fn cmd_regenerate(config: &AppConfig, yes: bool) -> Result<()> {
    let pipeline = pipeline(config)?;
    let total = pipeline.contacts().list_all().await?.len();
    if total == 0 {
        println!("No contacts found.");
        return Ok(());
    }

    if !yes {
        if !is_interactive() {
            return Err(eyre!("refusing to run non-interactively without --yes"));
        }
        let answer = ask(&format!(
            "This will regenerate emails for ALL {total} contact(s). Continue? (yes/no): "
        ))?
        .unwrap_or_default();
        if !is_yes(&answer) {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let reporter = CliProgress::new();
    let updated = pipeline.regenerate_all(&reporter).await;
    reporter.clear();
    println!("Regenerated {} of {total} emails.", updated?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Store commands
// ---------------------------------------------------------------------------

fn contact_store(config: &AppConfig) -> outreach_storage::ContactStore {
    outreach_storage::ContactStore::open(config.paths.contacts_file())
}

fn checkpoint_store(config: &AppConfig) -> outreach_storage::CheckpointStore {
    outreach_storage::CheckpointStore::new(config.paths.recovery_path())
}

async fn cmd_contacts_list(
    config: &AppConfig,
    status: Option<StatusArg>,
    niche: Option<String>,
    json: bool,
) -> Result<()> {
    let filter = ContactFilter {
        status: status.map(|s| match s {
            StatusArg::Sent => SentFilter::Sent,
            StatusArg::Unsent => SentFilter::Unsent,
        }),
        niche,
    };
    let contacts = contact_store(config).list_filtered(&filter).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&contacts)?);
        return Ok(());
    }

    if contacts.is_empty() {
        println!("No contacts.");
        return Ok(());
    }
    for c in &contacts {
        println!(
            "{}  {:<32} {:<20} {:<10} {}",
            c.id,
            c.email,
            c.niche,
            c.platform,
            if c.email_sent { "sent" } else { "unsent" }
        );
    }
    println!("{} contact(s)", contacts.len());
    Ok(())
}

async fn cmd_contacts_delete(config: &AppConfig, id: &str) -> Result<()> {
    if contact_store(config).delete(id).await? {
        println!("Deleted {id}");
        Ok(())
    } else {
        Err(eyre!("no contact with id {id}"))
    }
}

async fn cmd_checkpoints_status(config: &AppConfig) -> Result<()> {
    let store = checkpoint_store(config);
    let Some(meta) = store.run_metadata().await? else {
        println!("No run recorded in {}", store.dir().display());
        return Ok(());
    };
    let available = store.available_stages().await;

    println!("Run:             {}", meta.run_id);
    println!("Status:          {:?}", meta.status);
    println!("Started:         {}", meta.start_time.to_rfc3339());
    println!("Last update:     {}", meta.last_update.to_rfc3339());
    println!("Retry count:     {}", meta.retry_count);
    for stage in CheckpointStage::ALL {
        let mark = if available.contains(stage) { "present" } else { "-" };
        println!("  {:<16} {mark}", stage.as_str());
    }
    Ok(())
}

async fn cmd_checkpoints_clear(config: &AppConfig) -> Result<()> {
    let store = checkpoint_store(config);
    store.clear_checkpoints().await?;
    println!("Checkpoints cleared ({})", store.dir().display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

fn cmd_config_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(eyre!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        ));
    }
    save_config_to(&AppConfig::default(), path)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: &Path) -> Result<()> {
    let config = load(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("# {}", path.display());
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn clear(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn item(&self, label: &str, current: usize, total: usize) {
        self.spinner.set_message(format!("[{current}/{total}] {label}"));
    }

    fn finish(&self, message: &str) {
        self.spinner.println(format!("  {message}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_accepts_niche_with_country() {
        let cli = Cli::try_parse_from(["outreach", "run", "--niche", "bakery", "--country", "Kenya"])
            .unwrap();
        let Command::Run { niche, country, .. } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(niche.as_deref(), Some("bakery"));
        assert_eq!(country.as_deref(), Some("Kenya"));
    }

    #[test]
    fn run_rejects_niche_without_country() {
        assert!(Cli::try_parse_from(["outreach", "run", "--niche", "bakery"]).is_err());
        assert!(Cli::try_parse_from(["outreach", "run", "--country", "Kenya"]).is_err());
    }

    #[test]
    fn run_without_search_terms_resumes() {
        let cli = Cli::try_parse_from(["outreach", "run"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Run {
                niche: None,
                country: None,
                ..
            }
        ));
    }
}
