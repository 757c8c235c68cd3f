//! Fontes de métricas do host via `sysinfo`.
//!
//! Cada sampler roda na própria thread, então cada fonte tem a sua instância
//! de `System`/`Disks`/`Networks` em vez de um monitor único compartilhado.

use crate::sampler::{CounterSource, NetCounters, PercentSource, ReadError};
use std::collections::HashSet;
use std::time::Instant;
use sysinfo::{CpuRefreshKind, Disks, MemoryRefreshKind, Networks, RefreshKind, System};

/// Uso total da CPU (%).
pub struct CpuProbe {
    sys: System,
}

impl CpuProbe {
    pub fn new() -> Self {
        let mut sys = System::new_with_specifics(
            RefreshKind::nothing().with_cpu(CpuRefreshKind::nothing().with_cpu_usage()),
        );
        // O uso é relativo à leitura anterior; a primeira só inicializa
        sys.refresh_cpu_usage();
        Self { sys }
    }
}

impl PercentSource for CpuProbe {
    fn read(&mut self) -> Result<f64, ReadError> {
        self.sys.refresh_cpu_usage();
        if self.sys.cpus().is_empty() {
            return Err(ReadError::Unavailable("nenhuma CPU listada".into()));
        }
        Ok(self.sys.global_cpu_usage() as f64)
    }
}

/// Memória RAM em uso (%).
pub struct MemoryProbe {
    sys: System,
}

impl MemoryProbe {
    pub fn new() -> Self {
        let sys = System::new_with_specifics(
            RefreshKind::nothing().with_memory(MemoryRefreshKind::nothing().with_ram()),
        );
        Self { sys }
    }
}

impl PercentSource for MemoryProbe {
    fn read(&mut self) -> Result<f64, ReadError> {
        self.sys.refresh_memory();
        let total = self.sys.total_memory() as f64;
        let used = self.sys.used_memory() as f64;
        if total <= 0.0 {
            return Err(ReadError::Unavailable("memória total zero".into()));
        }
        Ok(used / total * 100.0)
    }
}

/// Espaço usado somando todos os discos (%).
pub struct DiskProbe {
    disks: Disks,
}

impl DiskProbe {
    pub fn new() -> Self {
        Self {
            disks: Disks::new_with_refreshed_list(),
        }
    }
}

impl PercentSource for DiskProbe {
    fn read(&mut self) -> Result<f64, ReadError> {
        self.disks.refresh(true);

        let mut seen = HashSet::new();
        let mut total: u64 = 0;
        let mut used: u64 = 0;

        for disk in self.disks.iter() {
            let space = disk.total_space();
            if space == 0 {
                continue;
            }
            // O mesmo dispositivo montado em vários pontos conta uma vez
            let name = disk.name().to_string_lossy().to_string();
            if !name.is_empty() && !seen.insert(name) {
                continue;
            }
            total += space;
            used += space.saturating_sub(disk.available_space());
        }

        usage_percent(used, total)
            .ok_or_else(|| ReadError::Unavailable("nenhum disco com espaço".into()))
    }
}

/// Bytes acumulados de todas as interfaces, menos loopback.
pub struct NetworkProbe {
    networks: Networks,
}

impl NetworkProbe {
    pub fn new() -> Self {
        Self {
            networks: Networks::new_with_refreshed_list(),
        }
    }
}

impl CounterSource for NetworkProbe {
    fn read(&mut self) -> Result<NetCounters, ReadError> {
        self.networks.refresh(true);

        let mut sent: u64 = 0;
        let mut recv: u64 = 0;
        for (name, data) in self.networks.iter() {
            if is_loopback(name) {
                continue;
            }
            sent = sent.saturating_add(data.total_transmitted());
            recv = recv.saturating_add(data.total_received());
        }

        Ok(NetCounters {
            sent,
            recv,
            at: Instant::now(),
        })
    }
}

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

fn usage_percent(used: u64, total: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some(used as f64 / total as f64 * 100.0)
}

fn is_loopback(name: &str) -> bool {
    let name = name.to_lowercase();
    name == "lo" || name.starts_with("lo0") || name.contains("loopback")
}
