//! Concurrent query generation.

use crate::model::{PredictionRecord, WorkItem};
use crate::prompt::build_messages;
use crate::providers::llm::{LlmClient, LlmProvider};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};
use tokio::time::{timeout, Duration};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per (item, level), including the first.
    pub max_attempts: u32,
    pub backoff: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Clone)]
pub struct GenerationDriver {
    pub provider: Arc<dyn LlmProvider>,
    pub schema_text: Arc<str>,
    pub retry: RetryPolicy,
    pub max_workers: usize,
}

impl GenerationDriver {
    pub fn new(provider: Arc<dyn LlmProvider>, schema_text: &str) -> Self {
        Self {
            provider,
            schema_text: Arc::from(schema_text),
            retry: RetryPolicy::default(),
            max_workers: 5,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// Generates the query for one level of one item. Returns `None` when the
    /// level has no question or every attempt failed.
    pub async fn generate(
        &self,
        client: &dyn LlmClient,
        item: &WorkItem,
        level: usize,
    ) -> Option<String> {
        let question = item.question(level)?;
        let messages = build_messages(&self.schema_text, question);
        let attempts = self.retry.max_attempts.max(1);

        for attempt in 1..=attempts {
            let outcome = match timeout(self.retry.timeout, client.complete(&messages)).await {
                Ok(Ok(resp)) => Ok(resp.text.trim().to_string()),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(format!("timed out after {:?}", self.retry.timeout)),
            };
            match outcome {
                Ok(text) => {
                    tracing::debug!(
                        instance = %item.instance_id,
                        level,
                        attempt,
                        provider = client.provider_name(),
                        "generated query"
                    );
                    return Some(text);
                }
                Err(error) => {
                    tracing::warn!(
                        instance = %item.instance_id,
                        level,
                        attempt,
                        max_attempts = attempts,
                        %error,
                        "generation attempt failed"
                    );
                    if attempt < attempts {
                        tokio::time::sleep(self.retry.backoff).await;
                    }
                }
            }
        }

        tracing::warn!(instance = %item.instance_id, level, "retry budget exhausted");
        None
    }

    async fn generate_item(&self, item: WorkItem, levels: usize) -> PredictionRecord {
        let client = match self.provider.session() {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(instance = %item.instance_id, error = %e, "failed to open session");
                return PredictionRecord::empty(item);
            }
        };
        let mut queries = Vec::with_capacity(levels);
        for level in 0..levels {
            queries.push(self.generate(client.as_ref(), &item, level).await);
        }
        PredictionRecord { item, queries }
    }

    /// Runs every item through the bounded worker pool and returns one record
    /// per input item, ordered by instance ordinal. Progress is reported in
    /// completion order.
    pub async fn generate_batch(&self, items: Vec<WorkItem>) -> Vec<PredictionRecord> {
        let total = items.len();
        let levels = items.iter().map(|i| i.questions.len()).max().unwrap_or(0);
        let sem = Arc::new(Semaphore::new(self.max_workers.max(1)));
        let mut workers = JoinSet::new();
        let mut pending: HashMap<task::Id, WorkItem> = HashMap::with_capacity(total);

        for item in items {
            let this = self.clone();
            let sem = sem.clone();
            let task_item = item.clone();
            let handle = workers.spawn(async move {
                let _permit = sem.acquire_owned().await.ok();
                this.generate_item(task_item, levels).await
            });
            pending.insert(handle.id(), item);
        }

        let mut records = Vec::with_capacity(total);
        while let Some(joined) = workers.join_next_with_id().await {
            let record = match joined {
                Ok((id, record)) => {
                    pending.remove(&id);
                    record
                }
                Err(e) => match pending.remove(&e.id()) {
                    Some(item) => {
                        tracing::warn!(
                            instance = %item.instance_id,
                            error = %e,
                            "generation worker died"
                        );
                        PredictionRecord::empty(item)
                    }
                    None => continue,
                },
            };
            tracing::info!(
                instance = %record.item.instance_id,
                completed = records.len() + 1,
                total,
                "generation progress"
            );
            records.push(record);
        }
        records.extend(pending.into_values().map(PredictionRecord::empty));

        records.sort_by(|a, b| {
            a.item
                .ordinal
                .cmp(&b.item.ordinal)
                .then_with(|| a.item.instance_id.cmp(&b.item.instance_id))
        });
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::llm::fake::FakeLlmProvider;

    fn item(id: &str, questions: &[Option<&str>]) -> WorkItem {
        WorkItem {
            instance_id: id.into(),
            ordinal: crate::dataset::instance_ordinal(id).unwrap(),
            gold_query: "RETURN 1".into(),
            questions: questions.iter().map(|q| q.map(String::from)).collect(),
            raw: Default::default(),
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_generate_retries_transient_failure() {
        let fake = FakeLlmProvider::new().fail_first(2).answer("q", "  MATCH (n) RETURN n \n");
        let driver = GenerationDriver::new(Arc::new(fake.clone()), "").with_retry(fast_retry(3));
        let client = fake.session().unwrap();
        let out = driver.generate(client.as_ref(), &item("m_1", &[Some("q")]), 0).await;
        assert_eq!(out.as_deref(), Some("MATCH (n) RETURN n"));
        assert_eq!(fake.attempts("q"), 3);
    }

    #[tokio::test]
    async fn test_generate_exhausted_budget_yields_none() {
        let fake = FakeLlmProvider::new().fail_first(10).answer("q", "RETURN 1");
        let driver = GenerationDriver::new(Arc::new(fake.clone()), "").with_retry(fast_retry(3));
        let client = fake.session().unwrap();
        let out = driver.generate(client.as_ref(), &item("m_1", &[Some("q")]), 0).await;
        assert_eq!(out, None);
        assert_eq!(fake.attempts("q"), 3);
    }

    #[tokio::test]
    async fn test_generate_timeout_counts_as_failed_attempt() {
        let fake = FakeLlmProvider::new()
            .answer("slow", "RETURN 1")
            .delay("slow", Duration::from_millis(200));
        let driver = GenerationDriver::new(Arc::new(fake.clone()), "").with_retry(RetryPolicy {
            max_attempts: 2,
            backoff: Duration::from_millis(1),
            timeout: Duration::from_millis(20),
        });
        let client = fake.session().unwrap();
        let out = driver.generate(client.as_ref(), &item("m_1", &[Some("slow")]), 0).await;
        assert_eq!(out, None);
        assert_eq!(fake.attempts("slow"), 2);
    }

    #[tokio::test]
    async fn test_missing_question_issues_no_request() {
        let fake = FakeLlmProvider::new();
        let driver = GenerationDriver::new(Arc::new(fake.clone()), "");
        let client = fake.session().unwrap();
        let out = driver.generate(client.as_ref(), &item("m_1", &[Some("  "), None]), 0).await;
        assert_eq!(out, None);
        assert_eq!(fake.attempts(""), 0);
        assert_eq!(fake.attempts("  "), 0);
    }

    #[tokio::test]
    async fn test_batch_sorts_by_ordinal_and_opens_one_session_per_item() {
        let mut fake = FakeLlmProvider::new();
        let mut items = Vec::new();
        // later ordinals finish first
        for i in (1..=10u64).rev() {
            let q = format!("question {}", i);
            fake = fake
                .answer(&q, &format!("RETURN {}", i))
                .delay(&q, Duration::from_millis(2 * i));
            items.push(item(&format!("movie_{}", i), &[Some(q.as_str()), None]));
        }
        let fake = fake.fail_first(1);
        let driver = GenerationDriver::new(Arc::new(fake.clone()), "schema")
            .with_retry(fast_retry(3))
            .with_workers(3);

        let records = driver.generate_batch(items).await;

        let ordinals: Vec<u64> = records.iter().map(|r| r.item.ordinal).collect();
        assert_eq!(ordinals, (1..=10).collect::<Vec<_>>());
        for r in &records {
            assert_eq!(r.query(0), Some(format!("RETURN {}", r.item.ordinal).as_str()));
            assert_eq!(r.query(1), None);
        }
        assert_eq!(fake.sessions(), 10);
    }

    #[tokio::test]
    async fn test_crashed_worker_is_backfilled_with_empty_record() {
        let fake = FakeLlmProvider::new()
            .answer("fine", "RETURN 1")
            .answer("also fine", "RETURN 3")
            .crash_on("boom");
        let driver = GenerationDriver::new(Arc::new(fake.clone()), "")
            .with_retry(fast_retry(1))
            .with_workers(2);
        let items = vec![
            item("movie_3", &[Some("also fine")]),
            item("movie_2", &[Some("boom"), Some("fine")]),
            item("movie_1", &[Some("fine")]),
        ];

        let records = driver.generate_batch(items).await;

        let ids: Vec<&str> = records.iter().map(|r| r.item.instance_id.as_str()).collect();
        assert_eq!(ids, vec!["movie_1", "movie_2", "movie_3"]);
        assert_eq!(records[0].query(0), Some("RETURN 1"));
        assert_eq!(records[1].queries, vec![None, None]);
        assert_eq!(records[2].query(0), Some("RETURN 3"));
    }
}
