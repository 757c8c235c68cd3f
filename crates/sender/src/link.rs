//! Link com o display – máquina de estados de reconexão.
//!
//! ```text
//!  Disconnected ──descoberta──▶ Connecting ──ok──▶ Connected
//!       ▲                          │ falha            │ erro de escrita
//!       │                          ▼ (espera retry)   │
//!       └──────────────────────────┴──────────────────┘
//! ```
//!
//! Em `Connected`, a cada intervalo é enviado um frame com as médias atuais.
//! Um erro de escrita é a única coisa que derruba o link: a porta é fechada,
//! `Disconnected` é emitido e a descoberta recomeça, indefinidamente.

use crate::discovery::{self, DeviceIdentity, Discovered, DiscoveryError, HandshakeSettings};
use crate::port::{DeviceStream, PortBackend};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use pulse_core::config::LinkConfig;
use pulse_core::protocol::{CodecError, FrameCodec};
use pulse_core::tracker::MetricSet;
use pulse_core::types::{Message, ThemeData};
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Estado da máquina de reconexão.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// Evento de status para quem exibe a conexão.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    Connected { port: String },
    Disconnected,
}

/// Erros de escrita no link.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Display não conectado")]
    NotConnected,

    #[error("Falha ao escrever na porta serial: {0}")]
    WriteFailed(#[source] io::Error),

    #[error("Erro ao codificar mensagem: {0}")]
    Encode(#[from] CodecError),
}

/// Tempos do link.
#[derive(Debug, Clone, Copy)]
pub struct LinkSettings {
    pub send_interval: Duration,
    pub retry_delay: Duration,
    pub handshake: HandshakeSettings,
}

impl From<&LinkConfig> for LinkSettings {
    fn from(cfg: &LinkConfig) -> Self {
        Self {
            send_interval: cfg.send_interval(),
            retry_delay: cfg.retry_delay(),
            handshake: HandshakeSettings::from(cfg),
        }
    }
}

struct ActiveLink {
    port: String,
    stream: Box<dyn DeviceStream>,
}

/// Slot da conexão; o mesmo lock serve ao envio periódico e aos comandos.
type LinkSlot = Arc<Mutex<Option<ActiveLink>>>;

fn lock_slot(slot: &LinkSlot) -> MutexGuard<'_, Option<ActiveLink>> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

/// Escreve um frame inteiro sob o lock da conexão. Retorna o nome da porta.
fn write_frame(slot: &LinkSlot, frame: &[u8]) -> Result<String, LinkError> {
    let mut guard = lock_slot(slot);
    let link = guard.as_mut().ok_or(LinkError::NotConnected)?;
    link.stream
        .write_all(frame)
        .and_then(|_| link.stream.flush())
        .map_err(LinkError::WriteFailed)?;
    Ok(link.port.clone())
}

// ──────────────────────────────────────────────
// Handle para comandos fora de banda
// ──────────────────────────────────────────────

/// Envia comandos (ex.: troca de tema) pela conexão ativa.
#[derive(Clone)]
pub struct LinkHandle {
    slot: LinkSlot,
    codec: Arc<dyn FrameCodec>,
}

impl LinkHandle {
    pub fn is_connected(&self) -> bool {
        lock_slot(&self.slot).is_some()
    }

    /// Envia um comando de tema. Uma falha de escrita só é reportada; quem
    /// derruba o link é o próximo envio periódico.
    pub fn send_theme(&self, theme: ThemeData) -> Result<(), LinkError> {
        let frame = self.codec.encode(&Message::Theme(theme.clone()))?;
        let port = write_frame(&self.slot, &frame)?;
        info!(
            "Tema alterado em {port}: variant={:?}, accent={:?}",
            theme.variant, theme.accent
        );
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Manager
// ──────────────────────────────────────────────

/// Dono da conexão com o display.
pub struct LinkManager {
    backend: Arc<dyn PortBackend>,
    codec: Arc<dyn FrameCodec>,
    identity: DeviceIdentity,
    settings: LinkSettings,
    metrics: MetricSet,
    slot: LinkSlot,
    state: LinkState,
    status_tx: Sender<LinkStatus>,
    greeting: Option<ThemeData>,
}

impl LinkManager {
    pub fn new(
        backend: Arc<dyn PortBackend>,
        codec: Arc<dyn FrameCodec>,
        identity: DeviceIdentity,
        settings: LinkSettings,
        metrics: MetricSet,
        status_tx: Sender<LinkStatus>,
    ) -> Self {
        Self {
            backend,
            codec,
            identity,
            settings,
            metrics,
            slot: Arc::new(Mutex::new(None)),
            state: LinkState::Disconnected,
            status_tx,
            greeting: None,
        }
    }

    /// Tema enviado logo após cada conexão.
    pub fn with_greeting(mut self, theme: Option<ThemeData>) -> Self {
        self.greeting = theme;
        self
    }

    pub fn handle(&self) -> LinkHandle {
        LinkHandle {
            slot: Arc::clone(&self.slot),
            codec: Arc::clone(&self.codec),
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Executa uma transição, sem dormir.
    ///
    /// Desconectado: roda a descoberta. Conectado: envia um frame de métricas.
    pub fn step(&mut self) -> LinkState {
        self.state = match self.state {
            LinkState::Disconnected | LinkState::Connecting => {
                self.state = LinkState::Connecting;
                self.connect()
            }
            LinkState::Connected => self.send_metrics(),
        };
        self.state
    }

    /// Loop principal: roda até `shutdown` ser fechado (ou receber algo).
    /// A porta é fechada em qualquer saída.
    pub fn run(&mut self, shutdown: &Receiver<()>) {
        loop {
            let started = Instant::now();
            let before = self.state;
            let after = self.step();

            let pause = match (before, after) {
                (_, LinkState::Connected) => {
                    self.settings.send_interval.saturating_sub(started.elapsed())
                }
                // Link caiu: redescobre imediatamente
                (LinkState::Connected, _) => Duration::ZERO,
                _ => self.settings.retry_delay,
            };

            if wait_or_shutdown(shutdown, pause) {
                break;
            }
        }

        info!("Encerrando link com o display");
        self.close();
    }

    /// Fecha a conexão atual, se houver, e emite `Disconnected`.
    pub fn close(&mut self) {
        let closed = lock_slot(&self.slot).take();
        if let Some(link) = closed {
            drop(link.stream);
            info!("Porta {} fechada", link.port);
            self.emit(LinkStatus::Disconnected);
        }
        self.state = LinkState::Disconnected;
    }

    fn connect(&mut self) -> LinkState {
        let found = discovery::discover(
            self.backend.as_ref(),
            self.codec.as_ref(),
            &self.identity,
            &self.settings.handshake,
        );
        let retry = self.settings.retry_delay.as_secs_f64();
        match found {
            Ok(discovered) => self.attach(discovered),
            Err(e @ DiscoveryError::NotFound(_)) => {
                info!("{e}, tentando novamente em {retry:.1}s...");
                LinkState::Disconnected
            }
            Err(e) => {
                warn!("{e}, tentando novamente em {retry:.1}s...");
                LinkState::Disconnected
            }
        }
    }

    fn attach(&mut self, discovered: Discovered) -> LinkState {
        let Discovered { port, stream } = discovered;
        *lock_slot(&self.slot) = Some(ActiveLink {
            port: port.clone(),
            stream,
        });
        info!("Conectado ao display em {port}");
        self.emit(LinkStatus::Connected { port });

        if let Some(theme) = self.greeting.clone() {
            match self.handle().send_theme(theme) {
                Ok(()) => {}
                Err(LinkError::WriteFailed(e)) => {
                    warn!("Conexão perdida ao enviar tema ({e}), reconectando...");
                    self.close();
                    return LinkState::Disconnected;
                }
                Err(e) => error!("Tema inicial não enviado: {e}"),
            }
        }

        LinkState::Connected
    }

    fn send_metrics(&mut self) -> LinkState {
        let metrics = self.metrics.snapshot();
        let frame = match self.codec.encode(&Message::Metrics(metrics)) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Erro ao serializar métricas: {e}");
                return LinkState::Connected;
            }
        };

        match write_frame(&self.slot, &frame) {
            Ok(port) => {
                debug!(
                    "→ {} bytes para {port} | CPU {:.1}% | RAM {:.1}% | GPU {:.1}% | ↑{:.2} ↓{:.2} | Disco {:.1}%",
                    frame.len(),
                    metrics.cpu,
                    metrics.memory,
                    metrics.gpu,
                    metrics.upload,
                    metrics.download,
                    metrics.disk
                );
                LinkState::Connected
            }
            Err(e) => {
                warn!("Conexão com o display perdida ({e}), reconectando...");
                self.close();
                LinkState::Disconnected
            }
        }
    }

    fn emit(&self, status: LinkStatus) {
        if self.status_tx.send(status).is_err() {
            debug!("Ninguém escutando eventos de status");
        }
    }
}

impl Drop for LinkManager {
    fn drop(&mut self) {
        self.close();
    }
}

/// Espera `pause`; retorna `true` se o shutdown chegou antes.
fn wait_or_shutdown(shutdown: &Receiver<()>, pause: Duration) -> bool {
    !matches!(shutdown.recv_timeout(pause), Err(RecvTimeoutError::Timeout))
}
