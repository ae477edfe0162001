//! Settlement metrics collection and reporting
//!
//! Tracks latency percentiles, success rates and settled volume for the
//! registry's payment gateway.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Maximum number of samples to keep for metrics calculation
const MAX_SAMPLES: usize = 100;

/// Settlement statistics for a gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementStats {
    /// Name of the gateway
    pub gateway_name: String,
    /// 50th percentile latency in milliseconds
    pub latency_p50_ms: f64,
    /// 99th percentile latency in milliseconds
    pub latency_p99_ms: f64,
    /// Success rate (0.0 to 1.0)
    pub success_rate: f64,
    /// Total number of settlements attempted
    pub total_settlements: u64,
    /// Number of failed settlements
    pub failed_settlements: u64,
    /// Sum of successfully settled amounts
    pub settled_volume: u128,
}

impl SettlementStats {
    /// Creates stats with no data
    pub fn empty(gateway_name: &str) -> Self {
        Self {
            gateway_name: gateway_name.to_string(),
            latency_p50_ms: 0.0,
            latency_p99_ms: 0.0,
            success_rate: 1.0,
            total_settlements: 0,
            failed_settlements: 0,
            settled_volume: 0,
        }
    }
}

/// Internal sample for latency tracking
#[derive(Debug, Clone)]
struct LatencySample {
    duration_ms: f64,
    success: bool,
}

#[derive(Debug, Default)]
struct Totals {
    settlements: u64,
    failed: u64,
    volume: u128,
}

/// Collects settlement outcomes
pub struct SettlementMetrics {
    /// Gateway name, replaced when the registry swaps gateways
    gateway_name: RwLock<String>,
    /// Rolling window of latency samples
    samples: Arc<RwLock<VecDeque<LatencySample>>>,
    /// Lifetime totals
    totals: Arc<RwLock<Totals>>,
}

impl SettlementMetrics {
    /// Creates a new collector for a gateway
    pub fn new(gateway_name: &str) -> Self {
        Self {
            gateway_name: RwLock::new(gateway_name.to_string()),
            samples: Arc::new(RwLock::new(VecDeque::with_capacity(MAX_SAMPLES))),
            totals: Arc::new(RwLock::new(Totals::default())),
        }
    }

    /// Starts a fresh window for a newly configured gateway
    pub async fn reset(&self, gateway_name: &str) {
        *self.gateway_name.write().await = gateway_name.to_string();
        self.samples.write().await.clear();
        *self.totals.write().await = Totals::default();
    }

    /// Records a settlement attempt
    ///
    /// `amount` counts towards volume only when `success` is true.
    pub async fn record_settlement(&self, duration: Duration, success: bool, amount: u64) {
        let duration_ms = duration.as_secs_f64() * 1000.0;

        {
            let mut totals = self.totals.write().await;
            totals.settlements += 1;
            if success {
                totals.volume += amount as u128;
            } else {
                totals.failed += 1;
            }
        }

        let mut samples = self.samples.write().await;
        if samples.len() >= MAX_SAMPLES {
            samples.pop_front();
        }
        samples.push_back(LatencySample {
            duration_ms,
            success,
        });
    }

    /// Computes current stats from collected samples
    pub async fn get_stats(&self) -> SettlementStats {
        let gateway_name = self.gateway_name.read().await.clone();
        let samples = self.samples.read().await;
        let totals = self.totals.read().await;

        if samples.is_empty() {
            return SettlementStats::empty(&gateway_name);
        }

        let mut latencies: Vec<f64> = samples
            .iter()
            .filter(|s| s.success)
            .map(|s| s.duration_ms)
            .collect();

        latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let success_rate = if totals.settlements > 0 {
            (totals.settlements - totals.failed) as f64 / totals.settlements as f64
        } else {
            1.0
        };

        SettlementStats {
            gateway_name,
            latency_p50_ms: percentile(&latencies, 50.0),
            latency_p99_ms: percentile(&latencies, 99.0),
            success_rate,
            total_settlements: totals.settlements,
            failed_settlements: totals.failed,
            settled_volume: totals.volume,
        }
    }
}

/// Calculate percentile from sorted values
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let idx = (p / 100.0 * (sorted_values.len() - 1) as f64).round() as usize;
    sorted_values[idx.min(sorted_values.len() - 1)]
}
