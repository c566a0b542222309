//! Scheduler de aquisição
//!
//! Máquina de estados `Idle → Running → Stopped`. Cada ciclo chama
//! `measure` no driver e entrega o resultado ao [`FanOut`]; ciclos com
//! falha são reportados e o loop segue. O pedido de parada é observado
//! apenas entre ciclos, nunca no meio de uma transação de barramento.
//!
//! Em [`Scheduler::run`] a medição roda no pool de bloqueio do tokio: I/O
//! I2C e atrasos de conversão não ocupam as threads que servem HTTP e
//! WebSocket.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::config::SchedulerConfig;
use crate::drivers::SensorDriver;
use crate::error::{SenError, SenResult};
use crate::sink::{CycleFailure, DeliveryReport, FanOut};
use crate::types::Measurement;

/// Estado do scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

/// Solicita a parada do scheduler (clonável, pode ser usado de outra task)
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stop_requested(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Resultado de um ciclo
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Delivered(DeliveryReport),
    Failed(SenError),
}

impl CycleOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, CycleOutcome::Delivered(_))
    }
}

/// Estatísticas do scheduler
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Ciclos executados (entregues + falhos)
    pub cycles: u64,
    pub delivered: u64,
    pub failed: u64,
    /// Entregas rejeitadas por sinks individuais
    pub sink_failures: u64,
    pub last_error: Option<String>,
}

/// Loop de aquisição de um driver
pub struct Scheduler<D> {
    driver: Arc<Mutex<D>>,
    fanout: FanOut,
    config: SchedulerConfig,
    state: SchedulerState,
    stats: SchedulerStats,
    stop_tx: Arc<watch::Sender<bool>>,
    stop_rx: watch::Receiver<bool>,
}

impl<D> std::fmt::Debug for Scheduler<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("fanout", &self.fanout)
            .field("config", &self.config)
            .field("state", &self.state)
            .field("stats", &self.stats)
            .finish()
    }
}

impl<D: SensorDriver> Scheduler<D> {
    pub fn new(driver: D, fanout: FanOut, config: SchedulerConfig) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            driver: Arc::new(Mutex::new(driver)),
            fanout,
            config,
            state: SchedulerState::Idle,
            stats: SchedulerStats::default(),
            stop_tx: Arc::new(stop_tx),
            stop_rx,
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            tx: Arc::clone(&self.stop_tx),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Acesso ao driver (bloqueia enquanto uma medição está em andamento)
    pub fn driver(&self) -> MutexGuard<'_, D> {
        self.driver.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn fanout_mut(&mut self) -> &mut FanOut {
        &mut self.fanout
    }

    /// Executa exatamente uma aquisição e a entrega, na thread atual
    pub fn run_cycle(&mut self) -> CycleOutcome {
        let result = self.driver().measure();
        self.complete_cycle(result)
    }

    fn complete_cycle(&mut self, result: SenResult<Measurement>) -> CycleOutcome {
        self.stats.cycles += 1;
        let cycle = self.stats.cycles;

        match result {
            Ok(measurement) => {
                let report = self.fanout.deliver(&measurement);
                self.stats.delivered += 1;
                self.stats.sink_failures += report.failures.len() as u64;
                debug!(cycle, delivered = report.delivered, "cycle delivered");
                CycleOutcome::Delivered(report)
            }
            Err(e) => {
                error!(cycle, error = %e, "acquisition cycle failed");
                self.stats.failed += 1;
                self.stats.last_error = Some(e.to_string());
                self.fanout.report_failure(&CycleFailure {
                    cycle,
                    error: e.clone(),
                });
                CycleOutcome::Failed(e)
            }
        }
    }

    fn stop_requested(&self) -> bool {
        *self.stop_rx.borrow()
    }
}

impl<D: SensorDriver + 'static> Scheduler<D> {
    /// Como [`run_cycle`](Self::run_cycle), com `measure` fora das threads do runtime
    pub async fn run_cycle_blocking(&mut self) -> CycleOutcome {
        let driver = Arc::clone(&self.driver);
        let result = tokio::task::spawn_blocking(move || {
            driver
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .measure()
        })
        .await
        .unwrap_or_else(|e| Err(SenError::Task(e.to_string())));
        self.complete_cycle(result)
    }

    /// Roda até esgotar a contagem de ciclos ou até um pedido de parada
    ///
    /// O primeiro ciclo é imediato; os seguintes aguardam `interval`.
    pub async fn run(&mut self) -> SenResult<SchedulerStats> {
        if self.state == SchedulerState::Stopped {
            return Err(SenError::SchedulerStopped);
        }

        self.state = SchedulerState::Running;
        info!(
            driver = self.driver().driver_name(),
            interval_ms = self.config.interval.as_millis() as u64,
            cycles = %self.config.cycles,
            "scheduler running"
        );

        loop {
            if self.stop_requested() {
                break;
            }

            self.run_cycle_blocking().await;

            if self.config.cycles.is_exhausted(self.stats.cycles) || self.stop_requested() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                // o sender vive em `self`, então `changed` não falha
                _ = self.stop_rx.changed() => {}
            }
        }

        self.state = SchedulerState::Stopped;
        info!(
            cycles = self.stats.cycles,
            delivered = self.stats.delivered,
            failed = self.stats.failed,
            "scheduler stopped"
        );
        Ok(self.stats.clone())
    }
}
