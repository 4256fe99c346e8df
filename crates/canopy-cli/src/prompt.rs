//! Terminal confirmation prompts.

use canopy_core::install::ConsentPrompt;
use dialoguer::Confirm;
use dialoguer::theme::ColorfulTheme;

/// Dialoguer-backed consent prompt; defaults to "no" so an accidental
/// Enter never approves a destructive operation.
pub struct TerminalPrompt {
    theme: ColorfulTheme,
}

impl TerminalPrompt {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl ConsentPrompt for TerminalPrompt {
    fn confirm(&self, message: &str) -> anyhow::Result<bool> {
        let accepted = Confirm::with_theme(&self.theme)
            .with_prompt(message)
            .default(false)
            .interact()?;
        Ok(accepted)
    }
}
