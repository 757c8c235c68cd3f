//! # Pulse Sender
//!
//! Amostra CPU, memória, GPU, rede e disco do host e envia as médias, uma vez
//! por segundo, para o display Pulse na porta serial. O display é procurado em
//! todas as portas e reconectado automaticamente se cair.
//!
//! ## Uso
//! ```bash
//! pulse_sender                       # config.toml ao lado do executável
//! RUST_LOG=debug pulse_sender        # loga cada frame enviado
//! PULSE_THEME=dark pulse_sender      # tema enviado ao conectar
//! ```
//!
//! Com o programa rodando, `theme <nome>` / `accent <cor>` no terminal trocam
//! o tema do display na hora.

mod commands;
mod discovery;
mod gpu;
mod link;
mod monitor;
mod port;
mod sampler;

use crossbeam_channel::{Sender, bounded, unbounded};
use discovery::DeviceIdentity;
use gpu::GpuProbe;
use link::{LinkManager, LinkSettings, LinkStatus};
use monitor::{CpuProbe, DiskProbe, MemoryProbe, NetworkProbe};
use port::SerialBackend;
use pulse_core::config::{AppConfig, DisplayConfig, SamplingConfig};
use pulse_core::protocol::FrameCodec;
use pulse_core::theme::theme_command;
use pulse_core::tracker::MetricSet;
use pulse_core::types::ThemeData;
use sampler::{NetworkJob, PercentJob, SampleTask, SamplerSupervisor};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{error, info, warn};

/// Sender do canal de shutdown; fechá-lo (drop) para todas as threads.
type ShutdownSlot = Arc<Mutex<Option<Sender<()>>>>;

fn main() {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Carregar config ──
    let config_path = AppConfig::default_path();
    let mut config = AppConfig::load(&config_path);

    // Salva config padrão se não existir
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    config.apply_env_overrides();
    for problem in config.validate() {
        warn!("Configuração: {problem}");
    }

    // ── Shutdown (Ctrl-C / SIGTERM) ──
    let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
    let shutdown: ShutdownSlot = Arc::new(Mutex::new(Some(shutdown_tx)));
    {
        let shutdown = Arc::clone(&shutdown);
        if let Err(e) = ctrlc::set_handler(move || {
            if request_shutdown(&shutdown) {
                info!("Sinal recebido, encerrando... (de novo para forçar)");
            } else {
                warn!("Segundo sinal, saindo sem esperar as threads");
                std::process::exit(130);
            }
        }) {
            error!("Falha ao instalar handler de Ctrl-C: {e}");
            return;
        }
    }

    // ── Samplers ──
    let metrics = MetricSet::new(&config.sampling.windows);
    let tasks = host_tasks(&config.sampling, &metrics, GpuProbe::detect());
    let samplers = match SamplerSupervisor::start(tasks, &shutdown_rx) {
        Ok(samplers) => samplers,
        Err(e) => {
            error!("Falha ao iniciar samplers: {e}");
            request_shutdown(&shutdown);
            return;
        }
    };

    // ── Status da conexão ──
    let (status_tx, status_rx) = unbounded::<LinkStatus>();
    let status_thread = thread::Builder::new()
        .name("status".into())
        .spawn(move || {
            for status in status_rx {
                match status {
                    LinkStatus::Connected { port } => info!("Conectado ✓ ({port})"),
                    LinkStatus::Disconnected => warn!("Desconectado ✗"),
                }
            }
        });

    // ── Link ──
    let codec: Arc<dyn FrameCodec> = Arc::from(config.link.encoding.codec());
    let codec_name = codec.name();
    let mut manager = LinkManager::new(
        Arc::new(SerialBackend),
        codec,
        DeviceIdentity::from(&config.device),
        LinkSettings::from(&config.link),
        metrics,
        status_tx,
    )
    .with_greeting(greeting(&config.display));

    // Comandos do terminal; a thread morre junto com o processo
    let handle = manager.handle();
    if let Err(e) = thread::Builder::new()
        .name("console".into())
        .spawn(move || commands::run_console(std::io::stdin().lock(), &handle))
    {
        warn!("Comandos pelo terminal indisponíveis: {e}");
    }

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   ⚡ PULSE MONITOR – SENDER ATIVO (Rust)");
    println!("══════════════════════════════════════════════");
    println!("  Samplers:  {}", samplers.len());
    println!(
        "  Rede:      {}",
        config.sampling.network_unit.label()
    );
    println!("  Serial:    {} baud, 8N1", config.link.baud_rate);
    println!("  Envio:     a cada {} ms", config.link.send_interval_ms);
    println!("  Encoding:  {codec_name}");
    println!("  Comandos:  digite help");
    println!("══════════════════════════════════════════════");
    println!();

    let link_shutdown = shutdown_rx.clone();
    let link_thread = thread::Builder::new()
        .name("link".into())
        .spawn(move || manager.run(&link_shutdown));
    let link_thread = match link_thread {
        Ok(handle) => Some(handle),
        Err(e) => {
            error!("Falha ao iniciar link serial: {e}");
            request_shutdown(&shutdown);
            None
        }
    };

    // ── Aguardar encerramento ──
    if let Some(link_thread) = link_thread {
        if link_thread.join().is_err() {
            error!("Thread do link terminou com pânico");
            request_shutdown(&shutdown);
        }
    }
    samplers.join();
    match status_thread {
        Ok(handle) => {
            let _ = handle.join();
        }
        Err(e) => warn!("Eventos de status não exibidos: {e}"),
    }

    info!("Pulse sender encerrado");
}

/// Fecha o canal de shutdown. Retorna `false` se já tinha sido fechado.
fn request_shutdown(slot: &ShutdownSlot) -> bool {
    let sender = slot.lock().unwrap_or_else(|e| e.into_inner()).take();
    sender.is_some()
}

/// Tarefas de amostragem do host. Sem GPU, nenhuma tarefa de GPU é criada e
/// a média fica em zero.
fn host_tasks(
    sampling: &SamplingConfig,
    metrics: &MetricSet,
    gpu: Option<GpuProbe>,
) -> Vec<SampleTask> {
    let fast = sampling.fast_interval();
    let slow = sampling.slow_interval();

    let mut tasks = vec![
        SampleTask::new("cpu", fast, PercentJob::new(CpuProbe::new(), metrics.cpu.clone())),
        SampleTask::new(
            "memory",
            fast,
            PercentJob::new(MemoryProbe::new(), metrics.memory.clone()),
        ),
        SampleTask::new(
            "network",
            fast,
            NetworkJob::new(
                NetworkProbe::new(),
                sampling.network_unit,
                metrics.upload.clone(),
                metrics.download.clone(),
            ),
        ),
        SampleTask::new("disk", slow, PercentJob::new(DiskProbe::new(), metrics.disk.clone())),
    ];

    if let Some(gpu) = gpu {
        info!("GPU via {}", gpu.source_name());
        tasks.push(SampleTask::new(
            "gpu",
            fast,
            PercentJob::new(gpu, metrics.gpu.clone()),
        ));
    }

    tasks
}

/// Tema configurado, enviado logo após cada conexão.
fn greeting(display: &DisplayConfig) -> Option<ThemeData> {
    let variant = display.variant();
    let accent = display.accent();
    if variant.is_none() && accent.is_none() {
        return None;
    }
    Some(theme_command(variant, accent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::TryRecvError;
    use std::time::Duration;

    fn schedule(tasks: &[SampleTask]) -> Vec<(&'static str, Duration)> {
        tasks.iter().map(|t| (t.name, t.period)).collect()
    }

    #[test]
    fn no_gpu_task_without_gpu() {
        let sampling = SamplingConfig::default();
        let tasks = host_tasks(&sampling, &MetricSet::default(), None);

        assert_eq!(
            schedule(&tasks),
            vec![
                ("cpu", sampling.fast_interval()),
                ("memory", sampling.fast_interval()),
                ("network", sampling.fast_interval()),
                ("disk", sampling.slow_interval()),
            ]
        );
    }

    #[test]
    fn gpu_task_runs_at_fast_cadence() {
        let mut sampling = SamplingConfig::default();
        sampling.fast_interval_ms = 150;
        sampling.slow_interval_ms = 7_000;
        let tasks = host_tasks(&sampling, &MetricSet::default(), Some(GpuProbe::NvidiaSmi));

        let schedule = schedule(&tasks);
        assert_eq!(schedule.len(), 5);
        assert!(schedule.contains(&("gpu", Duration::from_millis(150))));
        for (name, period) in schedule {
            let expected = if name == "disk" { 7_000 } else { 150 };
            assert_eq!(period, Duration::from_millis(expected), "{name}");
        }
    }

    #[test]
    fn greeting_only_when_something_is_configured() {
        let mut display = DisplayConfig::default();
        assert_eq!(
            greeting(&display),
            Some(ThemeData {
                variant: "light".into(),
                accent: "sapphire".into(),
            })
        );

        display.theme = String::new();
        display.accent = String::new();
        assert_eq!(greeting(&display), None);
    }

    #[test]
    fn second_shutdown_request_reports_already_closed() {
        let (tx, rx) = bounded::<()>(0);
        let slot: ShutdownSlot = Arc::new(Mutex::new(Some(tx)));

        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        assert!(request_shutdown(&slot));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Disconnected));
        assert!(!request_shutdown(&slot));
    }
}
