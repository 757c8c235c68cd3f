//! Samplers periódicos – uma thread por métrica.
//!
//! Cada [`SampleTask`] roda na própria cadência (200 ms para CPU/RAM/GPU/rede,
//! 5 s para disco), chama a fonte externa e empurra o valor no tracker. Uma
//! leitura que falha é simplesmente pulada: o próximo tick tenta de novo.

use crossbeam_channel::{Receiver, select, tick};
use pulse_core::config::NetworkUnit;
use pulse_core::tracker::MetricTracker;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Teto do throughput; absorve reset de contador e saltos de relógio.
pub const MAX_THROUGHPUT: f64 = 9999.99;

/// Falha transitória de uma leitura.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("Erro de I/O: {0}")]
    Io(#[from] io::Error),

    #[error("Leitura inválida: {0}")]
    Parse(String),

    #[error("Fonte indisponível: {0}")]
    Unavailable(String),
}

// ──────────────────────────────────────────────
// Fontes externas
// ──────────────────────────────────────────────

/// Fonte de uma métrica percentual (CPU, memória, GPU, disco).
pub trait PercentSource: Send {
    fn read(&mut self) -> Result<f64, ReadError>;
}

/// Contadores acumulados de bytes de rede.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetCounters {
    pub sent: u64,
    pub recv: u64,
    pub at: Instant,
}

/// Fonte dos contadores de rede.
pub trait CounterSource: Send {
    fn read(&mut self) -> Result<NetCounters, ReadError>;
}

// ──────────────────────────────────────────────
// Taxa de rede
// ──────────────────────────────────────────────

/// Throughput derivado entre duas leituras.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throughput {
    pub upload: f64,
    pub download: f64,
}

/// Guarda o snapshot anterior e converte deltas em Mbps (ou MB/s).
#[derive(Debug, Clone)]
pub struct NetRate {
    unit: NetworkUnit,
    last: Option<NetCounters>,
}

impl NetRate {
    pub fn new(unit: NetworkUnit) -> Self {
        Self { unit, last: None }
    }

    /// Snapshot atual (para inspeção).
    pub fn last(&self) -> Option<NetCounters> {
        self.last
    }

    /// Processa uma nova leitura.
    ///
    /// - primeira leitura: só guarda o snapshot;
    /// - tempo decorrido zero: ignora, sem tocar no snapshot;
    /// - caso contrário: calcula, limita a `[0, MAX_THROUGHPUT]` e sempre
    ///   atualiza o snapshot (mesmo quando o valor foi cortado).
    pub fn update(&mut self, current: NetCounters) -> Option<Throughput> {
        let Some(prev) = self.last else {
            self.last = Some(current);
            return None;
        };

        let elapsed = current.at.saturating_duration_since(prev.at).as_secs_f64();
        if elapsed <= 0.0 {
            return None;
        }

        let factor = self.unit.factor();
        let rate = |now: u64, before: u64| {
            ((now as f64 - before as f64) * factor / elapsed / 1e6).clamp(0.0, MAX_THROUGHPUT)
        };

        self.last = Some(current);
        Some(Throughput {
            upload: rate(current.sent, prev.sent),
            download: rate(current.recv, prev.recv),
        })
    }
}

// ──────────────────────────────────────────────
// Jobs
// ──────────────────────────────────────────────

/// Uma execução de amostragem.
pub trait SampleJob: Send {
    fn run(&mut self) -> Result<(), ReadError>;
}

/// Lê um percentual e empurra no tracker.
pub struct PercentJob<S> {
    source: S,
    tracker: Arc<MetricTracker>,
}

impl<S: PercentSource> PercentJob<S> {
    pub fn new(source: S, tracker: Arc<MetricTracker>) -> Self {
        Self { source, tracker }
    }
}

impl<S: PercentSource> SampleJob for PercentJob<S> {
    fn run(&mut self) -> Result<(), ReadError> {
        let value = self.source.read()?;
        if !value.is_finite() {
            return Err(ReadError::Parse(format!("valor não finito: {value}")));
        }
        self.tracker.add(value.clamp(0.0, 100.0));
        Ok(())
    }
}

/// Lê contadores de rede e alimenta os trackers de upload e download.
pub struct NetworkJob<S> {
    source: S,
    rate: NetRate,
    upload: Arc<MetricTracker>,
    download: Arc<MetricTracker>,
}

impl<S: CounterSource> NetworkJob<S> {
    pub fn new(
        source: S,
        unit: NetworkUnit,
        upload: Arc<MetricTracker>,
        download: Arc<MetricTracker>,
    ) -> Self {
        Self {
            source,
            rate: NetRate::new(unit),
            upload,
            download,
        }
    }
}

impl<S: CounterSource> SampleJob for NetworkJob<S> {
    fn run(&mut self) -> Result<(), ReadError> {
        let counters = self.source.read()?;
        if let Some(t) = self.rate.update(counters) {
            self.upload.add(t.upload);
            self.download.add(t.download);
        }
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Supervisor
// ──────────────────────────────────────────────

/// Tarefa periódica: nome, cadência e job.
pub struct SampleTask {
    pub name: &'static str,
    pub period: Duration,
    job: Box<dyn SampleJob>,
}

impl SampleTask {
    pub fn new(name: &'static str, period: Duration, job: impl SampleJob + 'static) -> Self {
        Self {
            name,
            period,
            job: Box::new(job),
        }
    }
}

/// Dono das threads de amostragem.
pub struct SamplerSupervisor {
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl SamplerSupervisor {
    /// Inicia uma thread por tarefa. Todas param quando `shutdown` é fechado.
    pub fn start(tasks: Vec<SampleTask>, shutdown: &Receiver<()>) -> io::Result<Self> {
        let mut handles = Vec::with_capacity(tasks.len());
        for task in tasks {
            let name = task.name;
            let shutdown = shutdown.clone();
            let handle = thread::Builder::new()
                .name(format!("sampler-{name}"))
                .spawn(move || run_task(task, &shutdown))?;
            info!("Sampler {name} iniciado");
            handles.push((name, handle));
        }
        Ok(Self { handles })
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Aguarda todas as threads terminarem.
    pub fn join(self) {
        for (name, handle) in self.handles {
            if handle.join().is_err() {
                warn!("Sampler {name} terminou com pânico");
            }
        }
    }
}

fn run_task(mut task: SampleTask, shutdown: &Receiver<()>) {
    let ticker = tick(task.period);
    loop {
        select! {
            recv(shutdown) -> _ => break,
            recv(ticker) -> _ => {
                if let Err(e) = task.job.run() {
                    debug!("Sampler {}: leitura pulada ({e})", task.name);
                }
            }
        }
    }
    debug!("Sampler {} encerrado", task.name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{Sender, bounded, unbounded};
    use std::collections::VecDeque;

    /// Fonte roteirizada; avisa num channel a cada leitura.
    struct Scripted {
        values: VecDeque<Result<f64, ReadError>>,
        reads: Sender<()>,
    }

    impl PercentSource for Scripted {
        fn read(&mut self) -> Result<f64, ReadError> {
            let _ = self.reads.send(());
            self.values
                .pop_front()
                .unwrap_or_else(|| Err(ReadError::Unavailable("fim do roteiro".into())))
        }
    }

    struct Counters(VecDeque<NetCounters>);

    impl CounterSource for Counters {
        fn read(&mut self) -> Result<NetCounters, ReadError> {
            self.0
                .pop_front()
                .ok_or_else(|| ReadError::Unavailable("sem leitura".into()))
        }
    }

    fn counters(sent: u64, recv: u64, at: Instant) -> NetCounters {
        NetCounters { sent, recv, at }
    }

    #[test]
    fn first_reading_only_primes_snapshot() {
        let t0 = Instant::now();
        let mut rate = NetRate::new(NetworkUnit::Mbps);
        assert_eq!(rate.update(counters(100, 200, t0)), None);
        assert_eq!(rate.last(), Some(counters(100, 200, t0)));
    }

    #[test]
    fn computes_megabits_per_second() {
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_millis(200);
        let mut rate = NetRate::new(NetworkUnit::Mbps);
        rate.update(counters(0, 0, t0));

        // 250 kB em 200 ms = 1.25 MB/s = 10 Mbps
        let t = rate.update(counters(250_000, 500_000, t1)).unwrap();
        assert!((t.upload - 10.0).abs() < 1e-9);
        assert!((t.download - 20.0).abs() < 1e-9);
    }

    #[test]
    fn megabytes_skip_the_bit_factor() {
        let t0 = Instant::now();
        let mut rate = NetRate::new(NetworkUnit::Mbyteps);
        rate.update(counters(0, 0, t0));
        let t = rate
            .update(counters(2_000_000, 0, t0 + Duration::from_secs(1)))
            .unwrap();
        assert!((t.upload - 2.0).abs() < 1e-9);
        assert_eq!(t.download, 0.0);
    }

    #[test]
    fn zero_elapsed_skips_and_keeps_snapshot() {
        let t0 = Instant::now();
        let mut rate = NetRate::new(NetworkUnit::Mbps);
        rate.update(counters(1_000, 1_000, t0));

        assert_eq!(rate.update(counters(9_000_000, 9_000_000, t0)), None);
        assert_eq!(rate.last(), Some(counters(1_000, 1_000, t0)));

        // O próximo delta ainda parte do snapshot original
        let t = rate
            .update(counters(1_000 + 125_000, 1_000, t0 + Duration::from_secs(1)))
            .unwrap();
        assert!((t.upload - 1.0).abs() < 1e-9);
    }

    #[test]
    fn rates_are_clamped_and_snapshot_still_advances() {
        let t0 = Instant::now();
        let mut rate = NetRate::new(NetworkUnit::Mbps);
        rate.update(counters(5_000_000, u64::MAX / 2, t0));

        // Reset de contador (delta negativo) e salto absurdo
        let t1 = t0 + Duration::from_millis(1);
        let t = rate.update(counters(0, u64::MAX, t1)).unwrap();
        assert_eq!(t.upload, 0.0);
        assert_eq!(t.download, MAX_THROUGHPUT);
        assert_eq!(rate.last(), Some(counters(0, u64::MAX, t1)));
    }

    #[test]
    fn clamp_holds_for_any_delta() {
        let t0 = Instant::now();
        let deltas = [0u64, 1, 999, 1_000_000, 10_000_000_000, u64::MAX / 4];
        let gaps = [1u64, 7, 200, 5_000];
        for &d in &deltas {
            for &ms in &gaps {
                let mut rate = NetRate::new(NetworkUnit::Mbps);
                rate.update(counters(u64::MAX / 2, u64::MAX / 2, t0));
                let at = t0 + Duration::from_millis(ms);
                let t = rate
                    .update(counters(u64::MAX / 2 + d, u64::MAX / 2 - d, at))
                    .unwrap();
                for v in [t.upload, t.download] {
                    assert!((0.0..=MAX_THROUGHPUT).contains(&v), "{v}");
                }
            }
        }
    }

    #[test]
    fn network_job_feeds_both_trackers() {
        let t0 = Instant::now();
        let up = Arc::new(MetricTracker::new(5));
        let down = Arc::new(MetricTracker::new(5));
        let source = Counters(VecDeque::from([
            counters(0, 0, t0),
            counters(125_000, 250_000, t0 + Duration::from_secs(1)),
        ]));
        let mut job = NetworkJob::new(source, NetworkUnit::Mbps, up.clone(), down.clone());

        job.run().unwrap();
        assert!(up.is_empty());
        job.run().unwrap();
        assert_eq!(up.average(), 1.0);
        assert_eq!(down.average(), 2.0);
        assert!(job.run().is_err());
        assert_eq!(up.len(), 1);
    }

    #[test]
    fn percent_job_skips_failures_and_clamps() {
        let (tx, _rx) = unbounded();
        let tracker = Arc::new(MetricTracker::new(5));
        let source = Scripted {
            values: VecDeque::from([
                Ok(10.0),
                Err(ReadError::Parse("lixo".into())),
                Ok(f64::NAN),
                Ok(140.0),
                Ok(-3.0),
            ]),
            reads: tx,
        };
        let mut job = PercentJob::new(source, tracker.clone());
        let results: Vec<bool> = (0..5).map(|_| job.run().is_ok()).collect();

        assert_eq!(results, [true, false, false, true, true]);
        assert_eq!(tracker.len(), 3);
        assert!((tracker.average() - (10.0 + 100.0 + 0.0) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn window_five_cpu_sequence_averages_forty() {
        let (tx, _rx) = unbounded();
        let tracker = Arc::new(MetricTracker::new(5));
        let source = Scripted {
            values: [10.0, 20.0, 30.0, 40.0, 50.0, 60.0].map(Ok).into(),
            reads: tx,
        };
        let mut job = PercentJob::new(source, tracker.clone());
        for _ in 0..6 {
            job.run().unwrap();
        }
        assert_eq!(tracker.average(), 40.0);
    }

    #[test]
    fn supervisor_runs_tasks_until_shutdown() {
        let (reads_tx, reads_rx) = unbounded();
        let tracker = Arc::new(MetricTracker::new(3));
        let source = Scripted {
            values: [
                Ok(1.0),
                Err(ReadError::Unavailable("tick perdido".into())),
                Ok(2.0),
                Ok(3.0),
            ]
            .into(),
            reads: reads_tx,
        };
        let task = SampleTask::new(
            "cpu",
            Duration::from_millis(5),
            PercentJob::new(source, tracker.clone()),
        );

        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let supervisor = SamplerSupervisor::start(vec![task], &shutdown_rx).unwrap();
        assert_eq!(supervisor.len(), 1);

        // Falha no segundo tick não derruba a tarefa
        for _ in 0..5 {
            reads_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        }
        drop(shutdown_tx);
        supervisor.join();

        assert_eq!(tracker.len(), 3);
        assert_eq!(tracker.average(), 2.0);
    }
}
