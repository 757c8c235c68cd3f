//! Backend serial em memória para testes.
//!
//! Cada porta simulada responde ao primeiro write de cada abertura com uma
//! resposta fixa (ou nada). Todas as aberturas, escritas e fechamentos ficam
//! registrados em ordem num log compartilhado.

use super::{DeviceStream, PortBackend};
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Evento observado pelo backend fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeEvent {
    Open(String),
    Write(String, Vec<u8>),
    WriteFailed(String),
    Close(String),
}

/// Comportamento de uma porta simulada.
#[derive(Debug, Clone)]
pub struct FakePort {
    name: String,
    openable: bool,
    reply: Option<Vec<u8>>,
    chunk: usize,
}

impl FakePort {
    /// Porta que responde `reply` ao handshake.
    pub fn replying(name: &str, reply: &str) -> Self {
        Self {
            name: name.into(),
            openable: true,
            reply: Some(reply.as_bytes().to_vec()),
            chunk: usize::MAX,
        }
    }

    /// Porta que abre mas nunca responde.
    pub fn silent(name: &str) -> Self {
        Self {
            name: name.into(),
            openable: true,
            reply: None,
            chunk: usize::MAX,
        }
    }

    /// Porta que falha ao abrir (em uso, sem permissão…).
    pub fn busy(name: &str) -> Self {
        Self {
            name: name.into(),
            openable: false,
            reply: None,
            chunk: usize::MAX,
        }
    }

    /// Entrega a resposta em pedaços de `chunk` bytes por `read`.
    pub fn chunked(mut self, chunk: usize) -> Self {
        self.chunk = chunk.max(1);
        self
    }
}

#[derive(Default)]
struct Shared {
    events: Vec<FakeEvent>,
    /// Aberturas com geração <= este valor estão cortadas.
    severed: Vec<(String, u64)>,
    generation: u64,
    list_fails: bool,
}

/// Backend fake clonável (o log é compartilhado entre clones).
#[derive(Clone)]
pub struct FakeBackend {
    ports: Arc<Mutex<Vec<FakePort>>>,
    shared: Arc<Mutex<Shared>>,
}

impl FakeBackend {
    pub fn new(ports: Vec<FakePort>) -> Self {
        Self {
            ports: Arc::new(Mutex::new(ports)),
            shared: Arc::new(Mutex::new(Shared::default())),
        }
    }

    /// Faz toda conexão já aberta nesta porta falhar no próximo write.
    pub fn sever(&self, name: &str) {
        let mut shared = self.shared.lock().unwrap();
        let generation = shared.generation;
        shared.severed.push((name.to_string(), generation));
    }

    /// Substitui a lista de portas (dispositivo plugado/removido).
    pub fn set_ports(&self, ports: Vec<FakePort>) {
        *self.ports.lock().unwrap() = ports;
    }

    pub fn fail_listing(&self, fail: bool) {
        self.shared.lock().unwrap().list_fails = fail;
    }

    pub fn events(&self) -> Vec<FakeEvent> {
        self.shared.lock().unwrap().events.clone()
    }

    pub fn opens(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, FakeEvent::Open(_)))
            .count()
    }

    /// Bytes escritos com sucesso numa porta, concatenados.
    pub fn written(&self, name: &str) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                FakeEvent::Write(port, bytes) if port == name => Some(bytes),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

impl PortBackend for FakeBackend {
    fn list_ports(&self) -> io::Result<Vec<String>> {
        if self.shared.lock().unwrap().list_fails {
            return Err(io::Error::other("enumeração indisponível"));
        }
        Ok(self.ports.lock().unwrap().iter().map(|p| p.name.clone()).collect())
    }

    fn open(
        &self,
        name: &str,
        _baud_rate: u32,
        _timeout: Duration,
    ) -> io::Result<Box<dyn DeviceStream>> {
        let port = self
            .ports
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, name.to_string()))?;
        if !port.openable {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "porta ocupada"));
        }

        let mut shared = self.shared.lock().unwrap();
        shared.generation += 1;
        let generation = shared.generation;
        shared.events.push(FakeEvent::Open(name.to_string()));

        Ok(Box::new(FakeStream {
            port,
            generation,
            pending: Vec::new(),
            replied: false,
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct FakeStream {
    port: FakePort,
    generation: u64,
    pending: Vec<u8>,
    replied: bool,
    shared: Arc<Mutex<Shared>>,
}

impl Write for FakeStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut shared = self.shared.lock().unwrap();
        let severed = shared
            .severed
            .iter()
            .any(|(name, g)| *name == self.port.name && self.generation <= *g);
        if severed {
            shared.events.push(FakeEvent::WriteFailed(self.port.name.clone()));
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "dispositivo removido"));
        }
        shared
            .events
            .push(FakeEvent::Write(self.port.name.clone(), buf.to_vec()));

        if !self.replied {
            self.replied = true;
            if let Some(reply) = &self.port.reply {
                self.pending.extend_from_slice(reply);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for FakeStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "sem resposta"));
        }
        let n = buf.len().min(self.pending.len()).min(self.port.chunk);
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        if let Ok(mut shared) = self.shared.lock() {
            shared.events.push(FakeEvent::Close(self.port.name.clone()));
        }
    }
}
