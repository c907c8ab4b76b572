use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

#[derive(Debug, Default)]
pub struct AppMetrics {
    requests_total: AtomicU64,
    refusals_total: AtomicU64,
    llm_calls_total: AtomicU64,
    llm_failures_total: AtomicU64,
    retrieval_hits_total: AtomicU64,
    total_latency_millis: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub refusals_total: u64,
    pub llm_calls_total: u64,
    pub llm_failures_total: u64,
    pub retrieval_hits_total: u64,
    pub avg_latency_millis: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("csf_chat_requests_total").increment(1);
    }

    pub fn inc_refusal(&self) {
        self.refusals_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("csf_chat_refusals_total").increment(1);
    }

    pub fn inc_llm_call(&self) {
        self.llm_calls_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("csf_llm_calls_total").increment(1);
    }

    pub fn inc_llm_failure(&self) {
        self.llm_failures_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("csf_llm_failures_total").increment(1);
    }

    pub fn add_retrieval_hits(&self, hits: usize) {
        self.retrieval_hits_total
            .fetch_add(hits as u64, Ordering::Relaxed);
        metrics::counter!("csf_retrieval_hits_total").increment(hits as u64);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
        metrics::histogram!("csf_chat_latency_seconds").record(duration.as_secs_f64());
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = self.requests_total.load(Ordering::Relaxed);
        let latency = self.total_latency_millis.load(Ordering::Relaxed);

        MetricsSnapshot {
            requests_total: requests,
            refusals_total: self.refusals_total.load(Ordering::Relaxed),
            llm_calls_total: self.llm_calls_total.load(Ordering::Relaxed),
            llm_failures_total: self.llm_failures_total.load(Ordering::Relaxed),
            retrieval_hits_total: self.retrieval_hits_total.load(Ordering::Relaxed),
            avg_latency_millis: if requests == 0 {
                0.0
            } else {
                latency as f64 / requests as f64
            },
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,csf_api=info,csf_agents=info,csf_llm=info",
                service_name
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .init();
    });
}
