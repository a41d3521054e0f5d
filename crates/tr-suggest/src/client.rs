//! Suggestion-engine abstraction and HTTP client.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use tr_types::config::OptimizationConfig;
use tr_types::filters::MetricMap;
use tr_types::params::ParamMap;

use crate::wire::{
    encode_params, CreateSessionRequest, CreateSessionResponse, RegisterRequest,
    RegisterResponse, SuggestResponse,
};

/// Service-assigned session identifier.
pub type SessionId = String;

/// Bounded timeout applied to every request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors surfaced by suggestion-service operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SuggestError {
    #[error("suggestion service unavailable: {message}")]
    ServiceUnavailable { message: String },
    #[error("service rejected the session config: {message}")]
    InvalidConfig { message: String },
    #[error("malformed service response: {message}")]
    MalformedResponse { message: String },
    #[error("suggestion call cancelled")]
    Cancelled,
}

/// Result alias for suggestion-service operations.
pub type SuggestResult<T> = Result<T, SuggestError>;

/// What the service answers when asked for the next candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum Suggestion {
    Candidate(ParamMap),
    /// The search space is used up. A normal terminus, not an error.
    Exhausted,
}

/// The service's judgment of a registered trial. The service is the sole
/// authority on validity and bestness; callers never recompute these.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegisterOutcome {
    pub is_valid: bool,
    pub is_best_so_far: bool,
    pub total_valid_count: u32,
}

impl From<RegisterResponse> for RegisterOutcome {
    fn from(response: RegisterResponse) -> Self {
        Self {
            is_valid: response.is_valid,
            is_best_so_far: response.is_best_so_far,
            total_valid_count: response.total_valid_count,
        }
    }
}

/// Interface to the external optimizer that proposes candidates and judges
/// outcomes.
///
/// Implementations may call a real service over HTTP (see
/// [`HttpSuggestClient`]) or run fully in-process (see
/// [`super::local::LocalSuggestService`]). Every operation samples the
/// cancellation token at entry; `close_session` is the exception, since it
/// runs during cleanup after cancellation may already have fired.
#[async_trait]
pub trait SuggestionService: Send + Sync {
    /// Open a session for the given config. Returns the service-assigned id.
    async fn create_session(
        &self,
        config: &OptimizationConfig,
        cancel: &CancellationToken,
    ) -> SuggestResult<SessionId>;

    /// Ask for the next candidate parameter set.
    async fn suggest(
        &self,
        session_id: &str,
        cancel: &CancellationToken,
    ) -> SuggestResult<Suggestion>;

    /// Report one trial's parameters and metrics back to the service.
    async fn register(
        &self,
        session_id: &str,
        params: &ParamMap,
        metrics: &MetricMap,
        cancel: &CancellationToken,
    ) -> SuggestResult<RegisterOutcome>;

    /// Close the session. Best-effort: callers log failures and move on.
    async fn close_session(&self, session_id: &str) -> SuggestResult<()>;
}

/// HTTP client for a remote suggestion service.
#[derive(Debug, Clone)]
pub struct HttpSuggestClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSuggestClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn transport(err: reqwest::Error) -> SuggestError {
        // Timeouts and connection failures alike: the service is unreachable.
        SuggestError::ServiceUnavailable {
            message: err.to_string(),
        }
    }

    fn decode<T>(result: Result<T, reqwest::Error>) -> SuggestResult<T> {
        result.map_err(|e| SuggestError::MalformedResponse {
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl SuggestionService for HttpSuggestClient {
    async fn create_session(
        &self,
        config: &OptimizationConfig,
        cancel: &CancellationToken,
    ) -> SuggestResult<SessionId> {
        if cancel.is_cancelled() {
            return Err(SuggestError::Cancelled);
        }

        let request = CreateSessionRequest::from_config(config);
        let response = self
            .client
            .post(self.url("sessions"))
            .timeout(REQUEST_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(Self::transport)?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
            let body = response.text().await.unwrap_or_default();
            return Err(SuggestError::InvalidConfig { message: body });
        }
        if !status.is_success() {
            return Err(SuggestError::ServiceUnavailable {
                message: format!("create session returned {status}"),
            });
        }

        let body: CreateSessionResponse = Self::decode(response.json().await)?;
        debug!(session_id = %body.session_id, "suggestion session created");
        Ok(body.session_id)
    }

    async fn suggest(
        &self,
        session_id: &str,
        cancel: &CancellationToken,
    ) -> SuggestResult<Suggestion> {
        if cancel.is_cancelled() {
            return Err(SuggestError::Cancelled);
        }

        let response = self
            .client
            .post(self.url(&format!("sessions/{session_id}/suggestions")))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(Self::transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SuggestError::ServiceUnavailable {
                message: format!("suggest returned {status}"),
            });
        }

        let body: SuggestResponse = Self::decode(response.json().await)?;
        if body.exhausted {
            return Ok(Suggestion::Exhausted);
        }
        let raw = body.params.ok_or_else(|| SuggestError::MalformedResponse {
            message: "suggest response had neither params nor exhausted".into(),
        })?;
        let params = crate::wire::decode_candidate(&raw)
            .map_err(|message| SuggestError::MalformedResponse { message })?;
        Ok(Suggestion::Candidate(params))
    }

    async fn register(
        &self,
        session_id: &str,
        params: &ParamMap,
        metrics: &MetricMap,
        cancel: &CancellationToken,
    ) -> SuggestResult<RegisterOutcome> {
        if cancel.is_cancelled() {
            return Err(SuggestError::Cancelled);
        }

        let request = RegisterRequest {
            params: encode_params(params),
            metrics: metrics.clone(),
        };
        let response = self
            .client
            .post(self.url(&format!("sessions/{session_id}/trials")))
            .timeout(REQUEST_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(Self::transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SuggestError::ServiceUnavailable {
                message: format!("register returned {status}"),
            });
        }

        let body: RegisterResponse = Self::decode(response.json().await)?;
        Ok(body.into())
    }

    async fn close_session(&self, session_id: &str) -> SuggestResult<()> {
        let response = self
            .client
            .delete(self.url(&format!("sessions/{session_id}")))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(Self::transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SuggestError::ServiceUnavailable {
                message: format!("close session returned {status}"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let client = HttpSuggestClient::new("http://localhost:9090/");
        assert_eq!(
            client.url("sessions/abc/trials"),
            "http://localhost:9090/sessions/abc/trials"
        );
    }
}
