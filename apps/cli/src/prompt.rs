//! Interactive stdin prompts.

use std::io::{IsTerminal, Write};

use color_eyre::eyre::Result;
use indicatif::ProgressBar;
use outreach_core::{RecoveryChoice, RecoveryContext, RecoveryPrompt};

/// Print `question` and read one trimmed line. `None` on EOF.
pub(crate) fn ask(question: &str) -> Result<Option<String>> {
    print!("{question}");
    std::io::stdout().flush()?;
    let mut input = String::new();
    if std::io::stdin().read_line(&mut input)? == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}

pub(crate) fn is_interactive() -> bool {
    std::io::stdin().is_terminal()
}

/// `yes` / `y`, case-insensitive.
pub(crate) fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "yes" | "y")
}

/// A count in `1..=max`, or `None`.
pub(crate) fn parse_count(answer: &str, max: usize) -> Option<usize> {
    answer
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|n| (1..=max).contains(n))
}

/// Menu answer to a choice. Anything unrecognised starts fresh.
pub(crate) fn parse_recovery_choice(answer: &str) -> RecoveryChoice {
    match answer.trim() {
        "1" => RecoveryChoice::Resume,
        "3" => RecoveryChoice::Exit,
        _ => RecoveryChoice::Fresh,
    }
}

/// Asks on stdin, pausing the spinner while the menu is shown.
pub(crate) struct StdinRecoveryPrompt {
    spinner: ProgressBar,
}

impl StdinRecoveryPrompt {
    pub(crate) fn new(spinner: ProgressBar) -> Self {
        Self { spinner }
    }
}

impl RecoveryPrompt for StdinRecoveryPrompt {
    fn choose(&self, context: &RecoveryContext) -> RecoveryChoice {
        self.spinner.suspend(|| {
            let meta = &context.metadata;
            let rule = "━".repeat(52);
            println!();
            println!("  Incomplete run detected");
            println!("  {rule}");
            println!("  Started:         {}", meta.start_time.format("%Y-%m-%d %H:%M:%S UTC"));
            println!(
                "  Last checkpoint: {}",
                meta.last_checkpoint.as_ref().map_or("none", |s| s.as_str())
            );
            println!("  Retry count:     {}", meta.retry_count);
            println!("  {rule}");
            if context.retry_warning {
                println!(
                    "  This run has failed {} times. Starting fresh is recommended.",
                    meta.retry_count
                );
            }
            println!();
            println!("  1. Resume from last checkpoint");
            println!("  2. Start fresh (discard previous data)");
            println!("  3. Exit");
            println!();

            match ask("Enter choice (1/2/3): ") {
                Ok(Some(answer)) => {
                    let choice = parse_recovery_choice(&answer);
                    if !matches!(answer.as_str(), "1" | "2" | "3") {
                        println!("Invalid choice. Starting fresh.");
                    }
                    choice
                }
                Ok(None) | Err(_) => RecoveryChoice::Exit,
            }
        })
    }
}
