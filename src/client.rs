use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use serde::Serialize;

use crate::config::Config;
use crate::error::{extract_detail_from_bytes, ChatError};
use crate::latex::normalize_delimiters;
use crate::state::{Action, ChatState, Command};
use crate::stream::{ingest, StreamEvent, StreamMode};

#[derive(Serialize)]
struct InvokeRequest<'a> {
    input: &'a str,
}

/// Client for the backend's streaming invoke endpoint.
#[derive(Clone, Debug)]
pub struct InvokeClient {
    client: Client,
    endpoint: String,
    mode: StreamMode,
}

impl InvokeClient {
    pub fn new(endpoint: &str, mode: StreamMode) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
            mode,
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            endpoint: config.endpoint().to_string(),
            mode: config.stream_mode(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    /// Send `input` and return the response if the backend accepted it.
    ///
    /// Non-success statuses are classified into a [`ChatError`], using the
    /// `detail` field of the body when one can be parsed.
    pub async fn open(&self, input: &str) -> Result<Response, ChatError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .json(&InvokeRequest { input })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = match response.bytes().await {
                Ok(body) => extract_detail_from_bytes(&body),
                Err(_) => None,
            };
            tracing::warn!(status = status.as_u16(), detail = ?detail, "backend rejected request");
            return Err(ChatError::from_status(status.as_u16(), detail));
        }

        Ok(response)
    }

    /// Run one submission end to end, reporting progress through `emit`.
    ///
    /// Emits `Opened`, any number of `Content`, then `Finished`; or `Failed`
    /// at whatever point the submission broke. Never returns an error itself.
    pub async fn invoke<F>(&self, input: &str, mut emit: F)
    where
        F: FnMut(StreamEvent),
    {
        tracing::debug!(endpoint = %self.endpoint, mode = self.mode.as_str(), "invoking backend");

        let response = match self.open(input).await {
            Ok(response) => response,
            Err(err) => {
                emit(StreamEvent::Failed(err));
                return;
            }
        };

        emit(StreamEvent::Opened);
        match ingest(response.bytes_stream(), self.mode, &mut emit).await {
            Ok(()) => emit(StreamEvent::Finished),
            Err(err) => emit(StreamEvent::Failed(err)),
        }
    }

    /// Run one message through the same state transitions the TUI uses and
    /// return the final reply with math delimiters normalized.
    pub async fn ask(&self, message: impl Into<String>) -> Result<String, ChatError> {
        let mut state = ChatState::new();
        state.update(Action::SetInput(message.into()));

        let Some(Command::Send(submission)) = state.update(Action::Submit) else {
            return Err(state.error().cloned().unwrap_or(ChatError::EmptyInput));
        };

        let id = submission.id;
        self.invoke(&submission.input, |event| {
            state.update(Action::Stream { id, event });
        })
        .await;

        if let Some(err) = state.error() {
            return Err(err.clone());
        }
        Ok(normalize_delimiters(state.last_reply().unwrap_or_default()))
    }
}
