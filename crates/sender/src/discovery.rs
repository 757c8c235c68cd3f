//! Descoberta do display nas portas seriais.
//!
//! Para cada porta candidata: abre, envia o handshake com o token do host e
//! lê a resposta por no máximo `timeout`. A porta é aceita se a resposta
//! contém o token esperado do display (substring: o firmware pode embrulhar
//! o token em JSON ou acrescentar metadados).

use crate::port::{DeviceStream, PortBackend};
use pulse_core::config::{DeviceConfig, LinkConfig};
use pulse_core::protocol::{CodecError, FrameCodec};
use pulse_core::types::Message;
use std::io::{self, ErrorKind, Read, Write};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Tokens de identidade do handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Enviado pelo host
    pub host_token: String,
    /// Procurado na resposta do display
    pub peer_token: String,
}

impl From<&DeviceConfig> for DeviceIdentity {
    fn from(cfg: &DeviceConfig) -> Self {
        Self {
            host_token: cfg.host_id.clone(),
            peer_token: cfg.peer_id.clone(),
        }
    }
}

/// Parâmetros de abertura/handshake por porta.
#[derive(Debug, Clone, Copy)]
pub struct HandshakeSettings {
    pub baud_rate: u32,
    pub timeout: Duration,
    pub buffer_size: usize,
}

impl From<&LinkConfig> for HandshakeSettings {
    fn from(cfg: &LinkConfig) -> Self {
        Self {
            baud_rate: cfg.baud_rate,
            timeout: cfg.handshake_timeout(),
            buffer_size: cfg.handshake_buffer,
        }
    }
}

/// Erros da descoberta. Nenhum é fatal: o link tenta de novo.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Falha ao listar portas seriais: {0}")]
    Enumerate(#[source] io::Error),

    #[error("Display Pulse não encontrado ({0} portas testadas)")]
    NotFound(usize),

    #[error("Handshake não pôde ser codificado: {0}")]
    Encode(#[from] CodecError),
}

/// Porta aceita, ainda aberta.
pub struct Discovered {
    pub port: String,
    pub stream: Box<dyn DeviceStream>,
}

impl std::fmt::Debug for Discovered {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Discovered").field("port", &self.port).finish()
    }
}

/// Percorre as portas em ordem e devolve a primeira que se identificar.
pub fn discover(
    backend: &dyn PortBackend,
    codec: &dyn FrameCodec,
    identity: &DeviceIdentity,
    settings: &HandshakeSettings,
) -> Result<Discovered, DiscoveryError> {
    let ports = backend.list_ports().map_err(DiscoveryError::Enumerate)?;
    let hello = codec.encode(&Message::Handshake(identity.host_token.clone()))?;

    for name in &ports {
        match probe_port(backend, name, &hello, identity.peer_token.as_bytes(), settings) {
            Ok(Some(stream)) => {
                info!("Display Pulse identificado em {name}");
                return Ok(Discovered {
                    port: name.clone(),
                    stream,
                });
            }
            Ok(None) => debug!("{name}: resposta sem o token esperado"),
            Err(e) => debug!("{name}: ignorada ({e})"),
        }
    }

    Err(DiscoveryError::NotFound(ports.len()))
}

/// Handshake numa porta. `Ok(None)` = respondeu (ou não) sem o token; a porta
/// é fechada ao sair do escopo.
fn probe_port(
    backend: &dyn PortBackend,
    name: &str,
    hello: &[u8],
    peer_token: &[u8],
    settings: &HandshakeSettings,
) -> io::Result<Option<Box<dyn DeviceStream>>> {
    let mut stream = backend.open(name, settings.baud_rate, settings.timeout)?;
    stream.write_all(hello)?;
    stream.flush()?;

    if read_until_token(&mut stream, peer_token, settings.timeout, settings.buffer_size)? {
        Ok(Some(stream))
    } else {
        Ok(None)
    }
}

/// Lê até achar `token`, encher o buffer ou estourar o prazo.
///
/// Cada `read` bloqueia no máximo o timeout da própria porta, então o tempo
/// total fica limitado a `timeout` mais uma leitura.
pub fn read_until_token<R: Read + ?Sized>(
    reader: &mut R,
    token: &[u8],
    timeout: Duration,
    buffer_size: usize,
) -> io::Result<bool> {
    let deadline = Instant::now() + timeout;
    let mut buf = vec![0u8; buffer_size.max(1)];
    let mut filled = 0;

    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => {
                filled += n;
                if contains(&buf[..filled], token) {
                    return Ok(true);
                }
            }
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                break;
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
        if Instant::now() >= deadline {
            break;
        }
    }

    Ok(contains(&buf[..filled], token))
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}
