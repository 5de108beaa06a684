//! One chat turn: validate, ensure the session, read recent context, call the
//! model, then record the exchange.
//!
//! History is read before the user message is written, so the model sees the
//! new question only through the live argument. A failed completion writes
//! nothing beyond the (idempotent) session row. A failed write after a
//! successful completion discards the reply.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Instrument;

use crate::completion::{CompletionBackend, CompletionError};
use crate::context::ContextWindow;
use crate::models::DocumentSet;
use crate::store::{Store, StoreError};

pub const SESSION_ID_REQUIRED: &str = "sessionId is required and must be a string.";
pub const MESSAGE_REQUIRED: &str = "message is required and must be a non-empty string.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnReply {
    pub reply: String,
    pub tokens_used: u32,
}

#[derive(Error, Debug)]
pub enum TurnError {
    #[error("{0}")]
    Validation(&'static str),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("Internal Server Error")]
    Server(#[source] StoreError),
}

impl TurnError {
    /// HTTP-style status code for the error object returned to callers.
    /// Every provider failure is a 500; the class only selects the message.
    pub fn status(&self) -> u16 {
        match self {
            TurnError::Validation(_) => 400,
            TurnError::Completion(_) | TurnError::Server(_) => 500,
        }
    }
}

/// Validated turn input: session id as given, message trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnInput {
    pub session_id: String,
    pub message: String,
}

impl TurnInput {
    pub fn parse(session_id: Option<&str>, message: Option<&str>) -> Result<Self, TurnError> {
        let session_id = match session_id {
            Some(id) if !id.is_empty() => id,
            _ => return Err(TurnError::Validation(SESSION_ID_REQUIRED)),
        };
        let message = match message.map(str::trim) {
            Some(m) if !m.is_empty() => m,
            _ => return Err(TurnError::Validation(MESSAGE_REQUIRED)),
        };
        Ok(Self {
            session_id: session_id.to_string(),
            message: message.to_string(),
        })
    }
}

#[derive(Clone)]
pub struct TurnOrchestrator {
    store: Store,
    backend: Arc<dyn CompletionBackend>,
    docs: Arc<DocumentSet>,
    window: ContextWindow,
}

impl TurnOrchestrator {
    pub fn new(
        store: Store,
        backend: Arc<dyn CompletionBackend>,
        docs: Arc<DocumentSet>,
        window: ContextWindow,
    ) -> Self {
        Self {
            store,
            backend,
            docs,
            window,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn docs(&self) -> &DocumentSet {
        &self.docs
    }

    /// Validate raw input and run the turn.
    pub async fn handle(
        &self,
        session_id: Option<&str>,
        message: Option<&str>,
    ) -> Result<TurnReply, TurnError> {
        let input = TurnInput::parse(session_id, message)?;
        self.run(input).await
    }

    pub async fn run(&self, input: TurnInput) -> Result<TurnReply, TurnError> {
        let span = tracing::info_span!("turn", session_id = %input.session_id);
        self.run_inner(input).instrument(span).await
    }

    async fn run_inner(&self, input: TurnInput) -> Result<TurnReply, TurnError> {
        let TurnInput {
            session_id,
            message,
        } = input;

        self.store
            .create_session(&session_id)
            .await
            .map_err(server_error)?;

        let history = self
            .window
            .fetch(&self.store, &session_id)
            .await
            .map_err(server_error)?;
        tracing::debug!(history = history.len(), backend = self.backend.name(), "Requesting completion");

        let completion = match self.backend.complete(&message, &history, &self.docs).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = ?e, "Completion failed; turn not recorded");
                return Err(e.into());
            }
        };

        self.store
            .record_exchange(&session_id, &message, &completion.reply, completion.tokens_used)
            .await
            .map_err(server_error)?;

        tracing::info!(tokens_used = completion.tokens_used, "Turn recorded");
        Ok(TurnReply {
            reply: completion.reply,
            tokens_used: completion.tokens_used,
        })
    }
}

fn server_error(e: StoreError) -> TurnError {
    tracing::error!(error = %e, "Persistence failure during turn");
    TurnError::Server(e)
}
