//! Carga da GPU NVIDIA.
//!
//! Tenta NVML primeiro (carrega `nvml.dll` / `libnvidia-ml.so` dinamicamente)
//! e cai para a ferramenta `nvidia-smi`. Sem nenhum dos dois, [`GpuProbe::detect`]
//! retorna `None` e o sampler de GPU nem é agendado. A detecção roda uma vez.

use crate::sampler::{PercentSource, ReadError};
use nvml_wrapper::Nvml;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const NVIDIA_SMI: &str = "nvidia-smi";

/// Prazo de uma chamada ao `nvidia-smi`; acima disso o processo é morto.
const SMI_TIMEOUT: Duration = Duration::from_secs(2);

/// Fonte de carga da GPU.
pub enum GpuProbe {
    Nvml(Nvml),
    NvidiaSmi,
}

impl GpuProbe {
    /// Detecta a fonte disponível. Retorna `None` se não houver GPU NVIDIA.
    pub fn detect() -> Option<Self> {
        match Nvml::init() {
            Ok(nvml) => {
                let count = nvml.device_count().unwrap_or(0);
                if count > 0 {
                    if let Ok(dev) = nvml.device_by_index(0) {
                        let name = dev.name().unwrap_or_else(|_| "Unknown".into());
                        info!("✓ NVML: {name} ({count} GPU(s))");
                    } else {
                        info!("✓ NVML: {count} GPU(s) NVIDIA");
                    }
                    return Some(GpuProbe::Nvml(nvml));
                }
                debug!("NVML init OK mas nenhuma GPU encontrada");
            }
            Err(e) => debug!("NVML não disponível: {e}"),
        }

        if nvidia_smi_available() {
            info!("✓ nvidia-smi encontrado, monitoramento de GPU ativo");
            return Some(GpuProbe::NvidiaSmi);
        }

        info!("✗ Nenhuma GPU NVIDIA detectada, carga da GPU fica em 0%");
        None
    }

    pub fn source_name(&self) -> &'static str {
        match self {
            GpuProbe::Nvml(_) => "NVML",
            GpuProbe::NvidiaSmi => NVIDIA_SMI,
        }
    }
}

impl PercentSource for GpuProbe {
    fn read(&mut self) -> Result<f64, ReadError> {
        match self {
            GpuProbe::Nvml(nvml) => {
                let device = nvml
                    .device_by_index(0)
                    .map_err(|e| ReadError::Unavailable(e.to_string()))?;
                let util = device
                    .utilization_rates()
                    .map_err(|e| ReadError::Unavailable(e.to_string()))?;
                Ok(util.gpu as f64)
            }
            GpuProbe::NvidiaSmi => query_nvidia_smi(),
        }
    }
}

fn nvidia_smi_available() -> bool {
    run_with_timeout(Command::new(NVIDIA_SMI).arg("--version"), SMI_TIMEOUT)
        .map(|out| out.status.success())
        .unwrap_or(false)
}

fn query_nvidia_smi() -> Result<f64, ReadError> {
    let out = run_with_timeout(
        Command::new(NVIDIA_SMI)
            .args(["--query-gpu=utilization.gpu", "--format=csv,noheader,nounits"]),
        SMI_TIMEOUT,
    )?;
    if !out.status.success() {
        return Err(ReadError::Unavailable(format!(
            "{NVIDIA_SMI} saiu com {}",
            out.status
        )));
    }
    parse_utilization(&String::from_utf8_lossy(&out.stdout))
}

/// Executa o comando e espera no máximo `timeout`. Processo travado é morto
/// e a leitura é pulada.
fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<Output, ReadError> {
    let mut child = cmd.stdout(Stdio::piped()).stderr(Stdio::null()).spawn()?;
    let deadline = Instant::now() + timeout;

    while child.try_wait()?.is_none() {
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ReadError::Unavailable(format!(
                "processo não respondeu em {:.1}s",
                timeout.as_secs_f64()
            )));
        }
        thread::sleep(Duration::from_millis(10));
    }

    Ok(child.wait_with_output()?)
}

/// Interpreta a saída CSV do `nvidia-smi` (uma linha por GPU; usa a primeira).
pub fn parse_utilization(output: &str) -> Result<f64, ReadError> {
    let line = output
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| ReadError::Parse("saída vazia".into()))?;
    line.parse::<f64>()
        .map_err(|e| ReadError::Parse(format!("{line:?}: {e}")))
}
