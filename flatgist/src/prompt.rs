//! Interactive prompt layer of the configuration resolver.

use anyhow::{Context, Result};
use dialoguer::{Input, Password};
use std::io::IsTerminal;

/// Source of interactively entered values. `None` means "nothing entered,
/// fall through to the default".
pub trait Prompter {
    fn text(&self, label: &str, default: &str) -> Result<Option<String>>;
    fn secret(&self, label: &str) -> Result<Option<String>>;
}

/// Asks on the terminal through dialoguer.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn text(&self, label: &str, default: &str) -> Result<Option<String>> {
        let value: String = Input::new()
            .with_prompt(label)
            .default(default.to_string())
            .allow_empty(true)
            .interact_text()
            .with_context(|| format!("failed to read '{label}' from terminal"))?;
        Ok(non_empty(value))
    }

    fn secret(&self, label: &str) -> Result<Option<String>> {
        let value = Password::new()
            .with_prompt(label)
            .allow_empty_password(true)
            .interact()
            .with_context(|| format!("failed to read '{label}' from terminal"))?;
        Ok(non_empty(value))
    }
}

/// Never asks; every prompt falls through to its default.
pub struct NonInteractive;

impl Prompter for NonInteractive {
    fn text(&self, _label: &str, _default: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn secret(&self, _label: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Terminal prompts unless disabled or stdin is not a terminal.
pub fn prompter_for(no_input: bool) -> Box<dyn Prompter> {
    if no_input || !std::io::stdin().is_terminal() {
        tracing::debug!(no_input, "Interactive prompts disabled");
        Box::new(NonInteractive)
    } else {
        Box::new(TerminalPrompter)
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
