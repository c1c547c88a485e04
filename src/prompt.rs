use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};
use nodepin_resolver::{PromptResponse, Prompter};
use tracing::warn;

/// Terminal prompts. Escape or a terminal error cancels the session.
pub struct TerminalPrompter {
  theme: ColorfulTheme,
}

impl TerminalPrompter {
  pub fn new() -> Self {
    Self {
      theme: ColorfulTheme::default(),
    }
  }
}

impl Default for TerminalPrompter {
  fn default() -> Self {
    Self::new()
  }
}

impl Prompter for TerminalPrompter {
  fn select(&mut self, prompt: &str, items: &[String]) -> PromptResponse<usize> {
    let picked = Select::with_theme(&self.theme)
      .with_prompt(prompt)
      .items(items)
      .default(0)
      .interact_opt();

    match picked {
      Ok(Some(index)) => PromptResponse::Answer(index),
      Ok(None) => PromptResponse::Cancelled,
      Err(e) => {
        warn!(error = %e, "prompt failed");
        PromptResponse::Cancelled
      }
    }
  }

  fn input(&mut self, prompt: &str) -> PromptResponse<String> {
    let entered = Input::<String>::with_theme(&self.theme)
      .with_prompt(prompt)
      .allow_empty(true)
      .interact_text();

    match entered {
      Ok(text) => PromptResponse::Answer(text),
      Err(e) => {
        warn!(error = %e, "prompt failed");
        PromptResponse::Cancelled
      }
    }
  }
}
