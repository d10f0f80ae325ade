//! Lifecycle of the currently selected image.
//!
//! Each generation is issued under a request id. A completion only applies
//! while the session is still generating under that same id. After a reset,
//! a new selection or a newer request, the result is reported as stale and
//! dropped.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedImage {
    pub name: String,
    pub data_url: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Ready(SelectedImage),
    Generating {
        image: SelectedImage,
        request_id: u64,
    },
    Succeeded {
        image: SelectedImage,
        prompt: String,
    },
    Failed {
        image: SelectedImage,
        error: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Ready,
    Generating,
    Succeeded,
    Failed,
}

/// Flat view of the session for the page: `{ isGenerating, error, currentPrompt }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationState {
    pub is_generating: bool,
    pub error: Option<String>,
    pub current_prompt: Option<String>,
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        match self {
            SessionState::Idle => SessionPhase::Idle,
            SessionState::Ready(_) => SessionPhase::Ready,
            SessionState::Generating { .. } => SessionPhase::Generating,
            SessionState::Succeeded { .. } => SessionPhase::Succeeded,
            SessionState::Failed { .. } => SessionPhase::Failed,
        }
    }

    pub fn image(&self) -> Option<&SelectedImage> {
        match self {
            SessionState::Idle => None,
            SessionState::Ready(image)
            | SessionState::Generating { image, .. }
            | SessionState::Succeeded { image, .. }
            | SessionState::Failed { image, .. } => Some(image),
        }
    }

    pub fn generation_state(&self) -> GenerationState {
        GenerationState {
            is_generating: matches!(self, SessionState::Generating { .. }),
            error: match self {
                SessionState::Failed { error, .. } => Some(error.clone()),
                _ => None,
            },
            current_prompt: match self {
                SessionState::Succeeded { prompt, .. } => Some(prompt.clone()),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("no image selected")]
    NoImage,

    #[error("a generation is already in progress")]
    AlreadyGenerating,
}

/// Handed out by [`Session::begin_generation`]; carries what the request needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationTicket {
    pub request_id: u64,
    pub image: SelectedImage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Succeeded(String),
    Failed(String),
    /// The request was superseded; state was left untouched.
    Stale,
}

#[derive(Debug)]
pub struct Session {
    state: SessionState,
    next_request_id: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            next_request_id: 1,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn select_image(&mut self, image: SelectedImage) {
        self.state = SessionState::Ready(image);
    }

    pub fn reset(&mut self) {
        self.state = SessionState::Idle;
    }

    /// Valid from `Ready`, `Succeeded` (regenerate) and `Failed` (retry).
    pub fn begin_generation(&mut self) -> Result<GenerationTicket, SessionError> {
        let image = match &self.state {
            SessionState::Idle => return Err(SessionError::NoImage),
            SessionState::Generating { .. } => return Err(SessionError::AlreadyGenerating),
            SessionState::Ready(image)
            | SessionState::Succeeded { image, .. }
            | SessionState::Failed { image, .. } => image.clone(),
        };

        let request_id = self.next_request_id;
        self.next_request_id += 1;
        self.state = SessionState::Generating {
            image: image.clone(),
            request_id,
        };

        Ok(GenerationTicket { request_id, image })
    }

    pub fn complete(&mut self, request_id: u64, result: Result<String, String>) -> Completion {
        let image = match &self.state {
            SessionState::Generating {
                image,
                request_id: current,
            } if *current == request_id => image.clone(),
            _ => return Completion::Stale,
        };

        match result {
            Ok(prompt) => {
                self.state = SessionState::Succeeded {
                    image,
                    prompt: prompt.clone(),
                };
                Completion::Succeeded(prompt)
            }
            Err(error) => {
                self.state = SessionState::Failed {
                    image,
                    error: error.clone(),
                };
                Completion::Failed(error)
            }
        }
    }
}
