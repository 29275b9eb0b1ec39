//! Question jobs
//!
//! [`QuestionService`] is the unit of work a worker runs per question: consult
//! the answer cache, load the file fresh, run the agent, cache the answer
//! unless the generation service failed.

use crate::artifacts::AnswerKind;
use crate::data_store::DatasetHandle;
use crate::orchestrator::DataAgent;
use crate::outcome::RunResult;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

pub fn cache_key(file_id: &str, question: &str) -> String {
    format!("answer:{}:{}", file_id, question)
}

pub trait AnswerCache: Send + Sync {
    fn get(&self, file_id: &str, question: &str) -> Option<RunResult>;
    fn put(&self, file_id: &str, question: &str, result: RunResult);
}

#[derive(Default)]
pub struct InMemoryAnswerCache {
    entries: DashMap<String, RunResult>,
}

impl InMemoryAnswerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl AnswerCache for InMemoryAnswerCache {
    fn get(&self, file_id: &str, question: &str) -> Option<RunResult> {
        self.entries
            .get(&cache_key(file_id, question))
            .map(|entry| entry.value().clone())
    }

    fn put(&self, file_id: &str, question: &str, result: RunResult) {
        self.entries.insert(cache_key(file_id, question), result);
    }
}

/// Hit/miss counters owned by one service.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

impl CacheStats {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStatsSnapshot {
            hits,
            misses,
            hit_rate: if total == 0 { 0.0 } else { hits as f64 / total as f64 },
        }
    }
}

/// What the caller receives for one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    pub kind: AnswerKind,
    pub cached: bool,
    pub result: RunResult,
}

impl Answer {
    fn new(result: RunResult, cached: bool) -> Self {
        let text = result.answer().to_string();
        Self {
            kind: AnswerKind::classify(&text),
            text,
            cached,
            result,
        }
    }
}

pub struct QuestionService {
    agent: DataAgent,
    cache: Arc<dyn AnswerCache>,
    stats: Arc<CacheStats>,
}

impl QuestionService {
    pub fn new(agent: DataAgent, cache: Arc<dyn AnswerCache>, stats: Arc<CacheStats>) -> Self {
        Self { agent, cache, stats }
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    pub async fn process_question(&self, file_id: &str, csv_path: &Path, question: &str) -> Answer {
        let started = Instant::now();

        if let Some(result) = self.cache.get(file_id, question) {
            self.stats.record_hit();
            info!("Cache hit for {}", cache_key(file_id, question));
            return Answer::new(result, true);
        }
        self.stats.record_miss();

        let dataset = match DatasetHandle::load_csv(csv_path) {
            Ok((dataset, _report)) => dataset,
            Err(err) => {
                // Not cached: the file may be fixed and re-uploaded under the same id.
                warn!("Failed to load {}: {}", csv_path.display(), err);
                return Answer::new(RunResult::from_error(&err), false);
            }
        };

        let result = self.agent.run(&dataset, question, file_id).await;
        if result.is_transient() {
            warn!("Not caching transient failure for {}", cache_key(file_id, question));
        } else {
            self.cache.put(file_id, question, result.clone());
        }

        info!(
            "Answered question for {} in {:.2}s",
            file_id,
            started.elapsed().as_secs_f64()
        );
        Answer::new(result, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_format() {
        assert_eq!(cache_key("abc", "what is x?"), "answer:abc:what is x?");
    }

    #[test]
    fn test_in_memory_cache() {
        let cache = InMemoryAnswerCache::new();
        assert!(cache.get("f", "q").is_none());
        cache.put("f", "q", RunResult::text("42"));
        assert_eq!(cache.get("f", "q"), Some(RunResult::text("42")));
        assert!(cache.get("g", "q").is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_stats_hit_rate() {
        let stats = CacheStats::default();
        assert_eq!(stats.snapshot().hit_rate, 0.0);
        stats.record_hit();
        stats.record_miss();
        stats.record_miss();
        stats.record_hit();
        let snapshot = stats.snapshot();
        assert_eq!((snapshot.hits, snapshot.misses), (2, 2));
        assert_eq!(snapshot.hit_rate, 0.5);
    }

    #[test]
    fn test_answer_kind() {
        let answer = Answer::new(RunResult::artifact("/tmp/a/dist_plots/x.svg"), false);
        assert_eq!(answer.kind, AnswerKind::Image);
        let answer = Answer::new(RunResult::text("Summary stats:\nprice: mean=2"), true);
        assert_eq!(answer.kind, AnswerKind::Text);
        assert!(answer.cached);
    }
}
