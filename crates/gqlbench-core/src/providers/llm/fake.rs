//! Scripted in-process generation backend for tests and dry runs.

use super::{LlmClient, LlmProvider};
use crate::model::{ChatMessage, LlmResponse};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
struct FakeScript {
    answers: HashMap<String, String>,
    delays: HashMap<String, Duration>,
    crashes: HashSet<String>,
    transient_failures: usize,
}

#[derive(Default)]
struct FakeCounters {
    attempts: Mutex<HashMap<String, usize>>,
    sessions: AtomicUsize,
}

/// Answers questions from a fixed table. The first `fail_first` attempts for
/// every question fail; unknown questions always fail.
#[derive(Clone, Default)]
pub struct FakeLlmProvider {
    script: Arc<FakeScript>,
    counters: Arc<FakeCounters>,
}

impl FakeLlmProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, question: &str, query: &str) -> Self {
        Arc::make_mut(&mut self.script)
            .answers
            .insert(question.to_string(), query.to_string());
        self
    }

    pub fn delay(mut self, question: &str, d: Duration) -> Self {
        Arc::make_mut(&mut self.script).delays.insert(question.to_string(), d);
        self
    }

    /// The worker asking this question panics.
    pub fn crash_on(mut self, question: &str) -> Self {
        Arc::make_mut(&mut self.script).crashes.insert(question.to_string());
        self
    }

    pub fn fail_first(mut self, n: usize) -> Self {
        Arc::make_mut(&mut self.script).transient_failures = n;
        self
    }

    pub fn attempts(&self, question: &str) -> usize {
        let attempts = self
            .counters
            .attempts
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        attempts.get(question).copied().unwrap_or(0)
    }

    pub fn sessions(&self) -> usize {
        self.counters.sessions.load(Ordering::SeqCst)
    }
}

impl LlmProvider for FakeLlmProvider {
    fn session(&self) -> anyhow::Result<Box<dyn LlmClient>> {
        self.counters.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeLlmClient {
            script: self.script.clone(),
            counters: self.counters.clone(),
        }))
    }
}

struct FakeLlmClient {
    script: Arc<FakeScript>,
    counters: Arc<FakeCounters>,
}

#[async_trait]
impl LlmClient for FakeLlmClient {
    async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<LlmResponse> {
        let question = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let attempt = {
            let mut attempts = self
                .counters
                .attempts
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            let n = attempts.entry(question.clone()).or_insert(0);
            *n += 1;
            *n
        };

        if let Some(d) = self.script.delays.get(&question) {
            tokio::time::sleep(*d).await;
        }

        if self.script.crashes.contains(&question) {
            panic!("scripted crash for '{}'", question);
        }

        if attempt <= self.script.transient_failures {
            anyhow::bail!("transient failure (attempt {})", attempt);
        }

        let text = self
            .script
            .answers
            .get(&question)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no scripted answer for '{}'", question))?;

        Ok(LlmResponse {
            text,
            provider: "fake".into(),
            model: "fake".into(),
            meta: serde_json::json!({ "attempt": attempt }),
        })
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}
