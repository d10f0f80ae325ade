use anyhow::{anyhow, Result};
use std::sync::Mutex;
use std::time::Duration;

use crate::data_url::DataUrl;
use crate::history_store::{HistoryItem, HistoryStore};
use crate::prompt_client::{PromptError, PromptProvider};
use crate::session::{
    Completion, GenerationTicket, SelectedImage, Session, SessionError, SessionState,
};

pub const MIN_GENERATING: Duration = Duration::from_millis(1500);

/// Session and history behind one lock, mutated only through user intents
/// and request completions.
pub struct Workspace {
    session: Session,
    history: HistoryStore,
}

impl Workspace {
    pub fn new(history: HistoryStore) -> Self {
        Self {
            session: Session::new(),
            history,
        }
    }

    pub fn state(&self) -> &SessionState {
        self.session.state()
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn select_image(&mut self, name: &str, image: &DataUrl) {
        let name = name.trim();
        self.session.select_image(SelectedImage {
            name: if name.is_empty() {
                "Image".to_string()
            } else {
                name.to_string()
            },
            data_url: image.as_string(),
            mime_type: image.mime_type().to_string(),
        });
    }

    pub fn reset(&mut self) {
        self.session.reset();
    }

    pub fn begin_generation(&mut self) -> Result<GenerationTicket, SessionError> {
        let ticket = self.session.begin_generation()?;
        log::info!(
            "generation #{} started for {}",
            ticket.request_id,
            ticket.image.name
        );
        Ok(ticket)
    }

    /// Applies a finished request. Successful prompts are added to history.
    pub fn finish_generation(
        &mut self,
        ticket: &GenerationTicket,
        result: Result<String, PromptError>,
    ) -> Completion {
        if matches!(&result, Err(err) if err.is_credential_error()) {
            log::error!(
                "generation #{} was refused: check the provider API key",
                ticket.request_id
            );
        }
        let completion = self
            .session
            .complete(ticket.request_id, result.map_err(|err| err.to_string()));

        match &completion {
            Completion::Succeeded(prompt) => {
                let item = HistoryItem::new(&ticket.image.name, &ticket.image.data_url, prompt);
                if let Err(err) = self.history.append(item) {
                    log::error!("{err:#}");
                }
                log::info!("generation #{} succeeded", ticket.request_id);
            }
            Completion::Failed(error) => {
                log::warn!("generation #{} failed: {error}", ticket.request_id);
            }
            Completion::Stale => {
                log::info!(
                    "generation #{} finished after being superseded; result dropped",
                    ticket.request_id
                );
            }
        }

        completion
    }

    /// Empties the history when the user confirmed. Returns whether anything
    /// was cleared.
    pub fn clear_history(&mut self, confirmed: bool) -> Result<bool> {
        if !confirmed {
            return Ok(false);
        }
        self.history.clear()?;
        log::info!("history cleared");
        Ok(true)
    }
}

/// Calls the provider and holds the result until `min_visible` has passed,
/// whichever takes longer.
pub async fn request_prompt(
    provider: &dyn PromptProvider,
    ticket: &GenerationTicket,
    min_visible: Duration,
) -> Result<String, PromptError> {
    let (result, _) = tokio::join!(
        provider.generate(&ticket.image.data_url, &ticket.image.mime_type),
        tokio::time::sleep(min_visible),
    );
    result
}

pub async fn run_generation(
    workspace: &Mutex<Workspace>,
    provider: &dyn PromptProvider,
    ticket: GenerationTicket,
    min_visible: Duration,
) -> Result<Completion> {
    let result = request_prompt(provider, &ticket, min_visible).await;
    let mut workspace = workspace
        .lock()
        .map_err(|_| anyhow!("workspace lock error"))?;
    Ok(workspace.finish_generation(&ticket, result))
}

/// Starts a generation for the current image and waits for it to finish.
pub async fn generate(
    workspace: &Mutex<Workspace>,
    provider: &dyn PromptProvider,
    min_visible: Duration,
) -> Result<Completion> {
    let ticket = {
        let mut guard = workspace
            .lock()
            .map_err(|_| anyhow!("workspace lock error"))?;
        guard.begin_generation()?
    };
    run_generation(workspace, provider, ticket, min_visible).await
}
