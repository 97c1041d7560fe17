use async_trait::async_trait;
use colored::*;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, MultiSelect, Password, Select};

use crate::error::{Result, SetupError};
use crate::prompts::{Prompter, Question};
use crate::worksheet::Reconciled;
use crate::RunSummary;

/// Interactive prompts on the controlling terminal
///
/// dialoguer blocks, so every question runs on the blocking thread pool and
/// the runtime thread stays free for in-flight API calls.
#[derive(Debug, Default, Clone)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    /// Creates a terminal prompter
    pub fn new() -> Self {
        Self
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> std::io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SetupError::Prompt(e.to_string()))?
        .map_err(|e| SetupError::Prompt(e.to_string()))
}

fn ask_secret(question: &Question) -> std::io::Result<String> {
    let theme = ColorfulTheme::default();
    loop {
        let answer = Password::with_theme(&theme)
            .with_prompt(question.message.as_str())
            .allow_empty_password(question.default.is_some() || question.allow_empty)
            .interact()?;
        let answer = match (&question.default, answer.is_empty()) {
            (Some(default), true) => default.clone(),
            _ => answer,
        };
        match question.check(&answer) {
            Ok(()) => return Ok(answer),
            Err(message) => eprintln!("{} {}", "[INVALID]".bright_red(), message),
        }
    }
}

fn ask_text(question: &Question) -> std::io::Result<String> {
    let theme = ColorfulTheme::default();
    let mut input = Input::<String>::with_theme(&theme);
    input
        .with_prompt(question.message.as_str())
        .allow_empty(question.allow_empty);
    if let Some(default) = &question.default {
        input.default(default.clone());
    }
    if let Some(validator) = question.validator {
        input.validate_with(move |answer: &String| validator(answer));
    }
    input.interact_text()
}

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn input(&self, question: Question) -> Result<String> {
        blocking(move || {
            if question.secret {
                ask_secret(&question)
            } else {
                ask_text(&question)
            }
        })
        .await
    }

    async fn select(&self, message: &str, items: &[String], default: usize) -> Result<usize> {
        let message = message.to_string();
        let items = items.to_vec();
        blocking(move || {
            Select::with_theme(&ColorfulTheme::default())
                .with_prompt(message)
                .items(&items)
                .default(default.min(items.len().saturating_sub(1)))
                .interact()
        })
        .await
    }

    async fn multi_select(&self, message: &str, items: &[String], defaults: &[bool]) -> Result<Vec<bool>> {
        let message = message.to_string();
        let items = items.to_vec();
        let defaults = defaults.to_vec();
        let count = items.len();
        let picked = blocking(move || {
            MultiSelect::with_theme(&ColorfulTheme::default())
                .with_prompt(message)
                .items(&items)
                .defaults(&defaults)
                .interact()
        })
        .await?;

        let mut selected = vec![false; count];
        for index in picked {
            if let Some(flag) = selected.get_mut(index) {
                *flag = true;
            }
        }
        Ok(selected)
    }

    async fn confirm(&self, message: &str, default: bool) -> Result<bool> {
        let message = message.to_string();
        blocking(move || {
            Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt(message)
                .default(default)
                .interact()
        })
        .await
    }
}

/// Prints the banner shown before the first question
pub fn print_banner() {
    println!("\n{}", "Leo host setup".bright_green().bold());
    println!("{}", "Creates checks, graphs and a worksheet for one host".bright_blue());
    println!("{}\n", "===================================================".bright_yellow());
}

/// Prints what a successful run did
pub fn print_summary(summary: &RunSummary) {
    if summary.components.is_empty() {
        println!("{} {}", "[SKIPPED]".bright_yellow(), "No components were enabled".bright_white());
    } else {
        println!(
            "{} {}",
            "[COMPONENTS]".bright_blue(),
            summary.components.join(", ").bright_white()
        );
    }

    match &summary.worksheet {
        Some(Reconciled::Created { cid }) => {
            println!("{} {}", "[CREATED]".bright_green(), format!("Worksheet {}", cid).bright_white());
        }
        Some(Reconciled::Updated { cid, stale }) => {
            println!("{} {}", "[UPDATED]".bright_green(), format!("Worksheet {}", cid).bright_white());
            if !stale.is_empty() {
                println!(
                    "{} {}",
                    "[WARNING]".bright_yellow(),
                    format!("Possibly stale worksheets, remove manually: {}", stale.join(", ")).yellow()
                );
            }
        }
        None => {}
    }

    if let Some(path) = &summary.saved_to {
        println!("{} {}", "[SAVED]".bright_blue(), format!("Configuration written to {}", path.display()).bright_white());
    }
}

/// Prints a fatal error
pub fn print_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".bright_red(), message.bright_red());
}
