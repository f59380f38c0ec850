//! Model interaction: prompt in, [`FieldRecord`] out.
//!
//! [`ModelClient`] owns the provider, the retry policy and the pacer. One
//! call to [`ModelClient::extract_record`] is one "call the model, with
//! retry" unit of work for a document: every outbound request goes through
//! the pacer, every failure goes through the policy, and the first answer
//! that parses wins.
//!
//! Parsing happens inside the retried closure so a malformed answer is seen
//! by the policy like any other failure (and, being terminal, ends the unit).

use crate::config::ExportConfig;
use crate::error::{Classify, DocumentError, FailureClass, ParseError, ProviderError};
use crate::pipeline::parse::parse_response;
use crate::pipeline::retry::{Pacer, RetryError, RetryPolicy, RetryState};
use crate::provider::GenerationProvider;
use crate::record::FieldRecord;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::debug;

/// Failure of a single model call, as seen by the retry policy.
#[derive(Debug, Clone, Error)]
pub enum CallError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl Classify for CallError {
    fn class(&self) -> FailureClass {
        match self {
            CallError::Provider(e) => e.class(),
            CallError::Parse(e) => e.class(),
        }
    }
}

/// Result of one [`ModelClient::extract_record`] unit.
#[derive(Debug, Clone)]
pub struct ModelOutcome {
    pub result: Result<FieldRecord, DocumentError>,
    pub state: RetryState,
    pub duration_ms: u64,
}

/// Provider + retry policy + pacer.
pub struct ModelClient {
    provider: Arc<dyn GenerationProvider>,
    policy: RetryPolicy,
    pacer: Pacer,
}

impl ModelClient {
    pub fn new(provider: Arc<dyn GenerationProvider>, policy: RetryPolicy, pacer: Pacer) -> Self {
        Self {
            provider,
            policy,
            pacer,
        }
    }

    pub fn from_config(provider: Arc<dyn GenerationProvider>, config: &ExportConfig) -> Self {
        Self::new(
            provider,
            RetryPolicy::from_config(config),
            Pacer::from_config(config),
        )
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Outbound calls made by this client so far, retries included.
    pub fn calls(&self) -> u32 {
        self.pacer.calls()
    }

    /// Send `prompt` until a record parses or the policy gives up.
    ///
    /// Never returns `Err`: the failure is carried in [`ModelOutcome::result`]
    /// so the caller can record it and move on to the next document.
    pub async fn extract_record(&self, label: &str, prompt: &str) -> ModelOutcome {
        let start = Instant::now();

        let run = self
            .policy
            .run(label, || async move {
                let raw = self.provider.generate(prompt).await;
                self.pacer.after_call().await;
                let raw = raw.map_err(CallError::from)?;
                debug!("{}: {} chars of model output", label, raw.len());
                parse_response(&raw).map_err(CallError::from)
            })
            .await;

        let duration_ms = start.elapsed().as_millis() as u64;
        match run {
            Ok((record, state)) => ModelOutcome {
                result: Ok(record),
                state,
                duration_ms,
            },
            Err(err) => {
                let state = err.state();
                ModelOutcome {
                    result: Err(to_document_error(err)),
                    state,
                    duration_ms,
                }
            }
        }
    }
}

fn to_document_error(err: RetryError<CallError>) -> DocumentError {
    match err {
        RetryError::Exhausted { last, state } => DocumentError::RetriesExhausted {
            attempts: state.faults,
            detail: last.to_string(),
        },
        RetryError::CooldownsExhausted { last, state } => DocumentError::QuotaExhausted {
            cooldowns: state.cooldowns,
            detail: last.to_string(),
        },
        RetryError::Terminal { error, .. } => match error {
            CallError::Parse(e) => DocumentError::MalformedResponse {
                detail: e.to_string(),
            },
            CallError::Provider(ProviderError::InvalidResponse(detail)) => {
                DocumentError::MalformedResponse { detail }
            }
            CallError::Provider(e) => DocumentError::Provider {
                detail: e.to_string(),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Pacing;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    const GOOD: &str = "```json\n{\"Raison sociale\": \"ACME\"}\n```";

    struct Scripted {
        answers: Mutex<VecDeque<Result<String, ProviderError>>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(answers: Vec<Result<&str, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(
                    answers
                        .into_iter()
                        .map(|a| a.map(str::to_string))
                        .collect(),
                ),
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl GenerationProvider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(GOOD.to_string()))
        }
    }

    fn client(provider: Arc<Scripted>, max_attempts: u32, pacing: Option<Pacing>) -> ModelClient {
        ModelClient::new(
            provider,
            RetryPolicy::new(max_attempts, Duration::from_secs(60)),
            Pacer::new(pacing),
        )
    }

    fn fault() -> ProviderError {
        ProviderError::ServerFault {
            status: 503,
            message: "UNAVAILABLE".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn good_answer_parses() {
        let provider = Scripted::new(vec![Ok(GOOD)]);
        let outcome = client(provider.clone(), 5, None)
            .extract_record("a.pdf", "prompt")
            .await;
        let record = outcome.result.expect("record");
        assert_eq!(record.get("Raison sociale"), Some("ACME"));
        assert_eq!(outcome.state.calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_answer_is_not_retried() {
        let provider = Scripted::new(vec![Ok("désolé, pas de JSON ici")]);
        let outcome = client(provider.clone(), 5, None)
            .extract_record("a.pdf", "prompt")
            .await;
        assert!(matches!(
            outcome.result,
            Err(DocumentError::MalformedResponse { .. })
        ));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_fault_reports_attempts() {
        let provider = Scripted::new((0..10).map(|_| Err(fault())).collect());
        let outcome = client(provider.clone(), 4, None)
            .extract_record("a.pdf", "prompt")
            .await;
        assert_eq!(
            outcome.result.unwrap_err(),
            DocumentError::RetriesExhausted {
                attempts: 4,
                detail: fault().to_string(),
            }
        );
        assert_eq!(provider.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn auth_failure_maps_to_provider_error() {
        let provider = Scripted::new(vec![Err(ProviderError::Rejected {
            status: 403,
            message: "API key not valid".into(),
        })]);
        let outcome = client(provider, 5, None)
            .extract_record("a.pdf", "prompt")
            .await;
        assert!(matches!(outcome.result, Err(DocumentError::Provider { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_count_towards_pacing() {
        let provider = Scripted::new(vec![Err(fault()), Err(fault())]);
        let client = client(
            provider,
            5,
            Some(Pacing {
                every: 3,
                pause_secs: 60,
            }),
        );
        let start = tokio::time::Instant::now();

        let outcome = client.extract_record("a.pdf", "prompt").await;

        assert!(outcome.result.is_ok());
        assert_eq!(client.calls(), 3);
        assert!(start.elapsed() >= Duration::from_secs(60));
    }
}
