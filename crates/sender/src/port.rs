//! Acesso às portas seriais.
//!
//! A descoberta e o link falam com [`PortBackend`]; em produção é o
//! [`SerialBackend`] (crate `serialport`), nos testes o [`fake::FakeBackend`].

use serialport::{DataBits, FlowControl, Parity, StopBits};
use std::io::{self, Read, Write};
use std::time::Duration;
use tracing::debug;

#[cfg(test)]
pub mod fake;

/// Stream bidirecional aberto para o display.
pub trait DeviceStream: Read + Write + Send {}

impl<T: Read + Write + Send + ?Sized> DeviceStream for T {}

/// Enumeração e abertura de portas.
pub trait PortBackend: Send + Sync {
    /// Nomes das portas candidatas, na ordem do sistema operacional.
    fn list_ports(&self) -> io::Result<Vec<String>>;

    /// Abre a porta em 8N1. `timeout` vale para leituras e escritas.
    fn open(&self, name: &str, baud_rate: u32, timeout: Duration)
        -> io::Result<Box<dyn DeviceStream>>;
}

/// Backend real via `serialport`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialBackend;

impl PortBackend for SerialBackend {
    fn list_ports(&self) -> io::Result<Vec<String>> {
        let ports = serialport::available_ports()?;
        debug!("{} portas seriais encontradas", ports.len());
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }

    fn open(
        &self,
        name: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> io::Result<Box<dyn DeviceStream>> {
        let port = serialport::new(name, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()?;
        Ok(Box::new(port))
    }
}
