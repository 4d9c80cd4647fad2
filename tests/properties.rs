// tests/properties.rs

//! Property-based tests for invariants that hold over a wide range of
//! inputs rather than one fixed case.

use async_trait::async_trait;
use opsd::core::alerts::{evaluate, AlertPipeline};
use opsd::core::errors::OpsResult;
use opsd::core::pool::{ConnectionPool, PoolConfig};
use opsd::core::ssh::session::ExecSession;
use opsd::core::ssh::Connector;
use opsd::core::types::{
    AlertLevel, AlertThresholds, DiskMount, Host, MemoryUsage, MetricsSnapshot, SystemSnapshot, Threshold,
};
use proptest::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn thresholds() -> AlertThresholds {
    AlertThresholds {
        cpu_usage: Threshold {
            warning: 70.0,
            critical: 90.0,
        },
        memory_usage: Threshold {
            warning: 75.0,
            critical: 90.0,
        },
        disk_usage: Threshold {
            warning: 80.0,
            critical: 90.0,
        },
        api_latency_ms: Threshold {
            warning: 200.0,
            critical: 500.0,
        },
    }
}

fn snapshot_with_cpu(cpu: f64) -> MetricsSnapshot {
    MetricsSnapshot {
        timestamp: chrono::Utc::now(),
        system: SystemSnapshot {
            cpu,
            memory: MemoryUsage {
                total: 100.0,
                used: 0.0,
                free: 100.0,
                percentage: 0.0,
            },
            disk: vec![],
        },
        healthchecks: vec![],
    }
}

proptest! {
    // Invariant 1 — an evaluated CPU value always lands in exactly the
    // level its position relative to warning/critical implies.
    #[test]
    fn cpu_level_matches_threshold_boundaries(cpu in 0.0f64..150.0) {
        let thresholds = thresholds();
        let alerts = evaluate(&snapshot_with_cpu(cpu), &thresholds);

        if cpu >= thresholds.cpu_usage.critical {
            prop_assert_eq!(alerts.len(), 1);
            prop_assert_eq!(alerts[0].level, AlertLevel::Critical);
            prop_assert_eq!(alerts[0].threshold, thresholds.cpu_usage.critical);
        } else if cpu >= thresholds.cpu_usage.warning {
            prop_assert_eq!(alerts.len(), 1);
            prop_assert_eq!(alerts[0].level, AlertLevel::High);
            prop_assert_eq!(alerts[0].threshold, thresholds.cpu_usage.warning);
        } else {
            prop_assert!(alerts.is_empty());
        }
    }

    // Invariant 1 — the same holds for a disk mount's percentage.
    #[test]
    fn disk_level_matches_threshold_boundaries(pct in 0.0f64..150.0) {
        let thresholds = thresholds();
        let mut snapshot = snapshot_with_cpu(0.0);
        snapshot.system.disk.push(DiskMount {
            device: "/dev/sda1".to_string(),
            mount: "/data".to_string(),
            percentage: pct,
        });
        let alerts = evaluate(&snapshot, &thresholds);

        if pct >= thresholds.disk_usage.critical {
            prop_assert_eq!(alerts.len(), 1);
            prop_assert_eq!(alerts[0].level, AlertLevel::Critical);
        } else if pct >= thresholds.disk_usage.warning {
            prop_assert_eq!(alerts.len(), 1);
            prop_assert_eq!(alerts[0].level, AlertLevel::High);
        } else {
            prop_assert!(alerts.is_empty());
        }
    }

    // Invariant 2 — an immediate repeat of the same snapshot never emits
    // a second alert for the same metric, regardless of the value chosen,
    // as long as it crosses a threshold at all.
    #[test]
    fn immediate_repeat_is_always_suppressed(cpu in 90.0f64..150.0) {
        let mut pipeline = AlertPipeline::new(thresholds(), None);
        let snapshot = snapshot_with_cpu(cpu);

        let first = pipeline.process(&snapshot);
        prop_assert_eq!(first.len(), 1);

        let second = pipeline.process(&snapshot);
        prop_assert!(second.is_empty());
    }
}

struct FakeSession;

#[async_trait]
impl ExecSession for FakeSession {
    async fn exec(&mut self, _command: &str) -> OpsResult<(Option<i32>, String, String)> {
        Ok((Some(0), String::new(), String::new()))
    }
    fn is_closed(&self) -> bool {
        false
    }
}

struct CountingConnector {
    dials: AtomicUsize,
}

#[async_trait]
impl Connector for CountingConnector {
    async fn connect(&self, _host: &Host) -> OpsResult<Box<dyn ExecSession>> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession))
    }
}

fn host(id: &str) -> Host {
    Host {
        id: id.to_string(),
        address: "127.0.0.1".to_string(),
        port: 22,
        user: "ops".to_string(),
        private_key: String::new(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    // Invariant 6 — however many distinct hosts are acquired, the pool
    // never holds more entries than its configured cap.
    #[test]
    fn pool_never_exceeds_its_cap(host_count in 1usize..12, cap in 1usize..6) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let pool = ConnectionPool::with_connector(
                PoolConfig {
                    max_connections: cap,
                    idle_timeout: std::time::Duration::from_secs(300),
                },
                Arc::new(CountingConnector { dials: AtomicUsize::new(0) }),
            );

            let mut acquired = 0;
            for i in 0..host_count {
                if pool.acquire(&host(&format!("host-{i}"))).await.is_ok() {
                    acquired += 1;
                }
            }

            prop_assert!(pool.status().size <= cap);
            prop_assert_eq!(pool.status().size, acquired.min(cap));
            Ok(())
        })?;
    }

    // Invariant 6 — host keys fold to lowercase, so any casing of the same
    // identity addresses the same pool entry.
    #[test]
    fn host_keys_are_case_insensitive(id in "[A-Za-z]{3,10}-[0-9]{1,3}") {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let pool = ConnectionPool::with_connector(
                PoolConfig::default(),
                Arc::new(CountingConnector { dials: AtomicUsize::new(0) }),
            );
            pool.acquire(&host(&id.to_uppercase())).await.unwrap();
            pool.release(&id.to_lowercase()).await;
            prop_assert_eq!(pool.status().size, 1);

            pool.close_all().await;
            prop_assert_eq!(pool.status().size, 0);
            Ok(())
        })?;
    }
}
