//! Configuração unificada via TOML.
//!
//! Um único `config.toml` ao lado do executável; campos ausentes assumem o
//! padrão. `PULSE_THEME` / `PULSE_ACCENT` sobrescrevem a seção `[display]`.

use crate::protocol::Encoding;
use crate::theme::{Accent, ThemeVariant};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Unidade do throughput de rede.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkUnit {
    /// Megabits por segundo
    #[default]
    Mbps,
    /// Megabytes por segundo
    Mbyteps,
}

impl NetworkUnit {
    /// Fator aplicado aos bytes antes de dividir por 1e6.
    pub fn factor(self) -> f64 {
        match self {
            NetworkUnit::Mbps => 8.0,
            NetworkUnit::Mbyteps => 1.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            NetworkUnit::Mbps => "Mbps",
            NetworkUnit::Mbyteps => "MB/s",
        }
    }
}

/// Tamanho da janela de média por métrica.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub cpu: usize,
    pub memory: usize,
    pub gpu: usize,
    pub upload: usize,
    pub download: usize,
    pub disk: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            cpu: 5,
            memory: 5,
            gpu: 5,
            upload: 5,
            download: 5,
            disk: 5,
        }
    }
}

/// Cadência dos samplers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// CPU, memória, GPU e rede (ms)
    pub fast_interval_ms: u64,
    /// Disco (ms)
    pub slow_interval_ms: u64,
    pub network_unit: NetworkUnit,
    pub windows: WindowConfig,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            fast_interval_ms: 200,
            slow_interval_ms: 5000,
            network_unit: NetworkUnit::default(),
            windows: WindowConfig::default(),
        }
    }
}

impl SamplingConfig {
    pub fn fast_interval(&self) -> Duration {
        Duration::from_millis(self.fast_interval_ms)
    }

    pub fn slow_interval(&self) -> Duration {
        Duration::from_millis(self.slow_interval_ms)
    }
}

/// Link serial com o display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub baud_rate: u32,
    /// Intervalo entre frames de métricas (ms)
    pub send_interval_ms: u64,
    /// Espera entre tentativas de descoberta (ms)
    pub retry_delay_ms: u64,
    /// Tempo máximo esperando a resposta do handshake, por porta (ms)
    pub handshake_timeout_ms: u64,
    /// Bytes lidos da resposta do handshake
    pub handshake_buffer: usize,
    pub encoding: Encoding,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            send_interval_ms: 1000,
            retry_delay_ms: 2000,
            handshake_timeout_ms: 500,
            handshake_buffer: 128,
            encoding: Encoding::default(),
        }
    }
}

impl LinkConfig {
    pub fn send_interval(&self) -> Duration {
        Duration::from_millis(self.send_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

/// Tokens de identidade do handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Enviado pelo host no handshake
    pub host_id: String,
    /// Procurado (substring) na resposta do display
    pub peer_id: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host_id: "ed1d2a7c8af14a27b77b1c127d806aed".into(),
            peer_id: "91d8141364e544e181fca2382cd6751a".into(),
        }
    }
}

/// Tema aplicado ao display logo após conectar. Vazio = não enviar.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub theme: String,
    pub accent: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            theme: "light".into(),
            accent: "sapphire".into(),
        }
    }
}

impl DisplayConfig {
    pub fn variant(&self) -> Option<ThemeVariant> {
        ThemeVariant::from_name(&self.theme)
    }

    pub fn accent(&self) -> Option<Accent> {
        Accent::from_name(&self.accent)
    }
}

/// Configuração raiz do aplicativo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sampling: SamplingConfig,
    pub link: LinkConfig,
    pub device: DeviceConfig,
    pub display: DisplayConfig,
}

impl AppConfig {
    /// Carrega configuração de um arquivo TOML.
    ///
    /// Arquivo ausente, ilegível ou inválido resulta na configuração padrão.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<AppConfig>(&content) {
                    Ok(config) => {
                        let errors = config.validate();
                        if errors.is_empty() {
                            info!("Configuração carregada de {}", path.display());
                            return config;
                        }
                        for e in &errors {
                            warn!("{}: {e}", path.display());
                        }
                    }
                    Err(e) => {
                        warn!("Erro ao parsear {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Erro ao ler {}: {}", path.display(), e);
                }
            }
        }

        info!("Usando configuração padrão");
        AppConfig::default()
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content = toml::to_string_pretty(self).map_err(|e| e.to_string())?;
        std::fs::write(path, content).map_err(|e| e.to_string())?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do config.toml.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("config.toml")
    }

    /// Aplica `PULSE_THEME` / `PULSE_ACCENT` do ambiente.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Mesma coisa que [`apply_env_overrides`](Self::apply_env_overrides),
    /// com a fonte das variáveis injetada.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(theme) = lookup("PULSE_THEME") {
            info!("Tema definido pelo ambiente: {theme}");
            self.display.theme = theme;
        }
        if let Some(accent) = lookup("PULSE_ACCENT") {
            info!("Cor de destaque definida pelo ambiente: {accent}");
            self.display.accent = accent;
        }
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.sampling.fast_interval_ms == 0 {
            errors.push("Intervalo rápido de amostragem não pode ser 0".into());
        }
        if self.sampling.slow_interval_ms == 0 {
            errors.push("Intervalo lento de amostragem não pode ser 0".into());
        }
        let w = &self.sampling.windows;
        if [w.cpu, w.memory, w.gpu, w.upload, w.download, w.disk].contains(&0) {
            errors.push("Janelas de média precisam ter ao menos 1 amostra".into());
        }

        if self.link.baud_rate == 0 {
            errors.push("Baud rate não pode ser 0".into());
        }
        if self.link.send_interval_ms == 0 {
            errors.push("Intervalo de envio não pode ser 0".into());
        }
        if self.link.retry_delay_ms == 0 {
            errors.push("Intervalo entre tentativas de conexão não pode ser 0".into());
        }
        if self.link.handshake_timeout_ms == 0 {
            errors.push("Timeout do handshake não pode ser 0".into());
        }

        if self.device.host_id.trim().is_empty() {
            errors.push("host_id não pode ser vazio".into());
        }
        if self.device.peer_id.trim().is_empty() {
            errors.push("peer_id não pode ser vazio".into());
        }
        if self.link.handshake_buffer < self.device.peer_id.len() {
            errors.push(format!(
                "handshake_buffer ({}) menor que o peer_id ({} bytes)",
                self.link.handshake_buffer,
                self.device.peer_id.len()
            ));
        }

        if !self.display.theme.is_empty() && self.display.variant().is_none() {
            errors.push(format!("Tema desconhecido: {}", self.display.theme));
        }
        if !self.display.accent.is_empty() && self.display.accent().is_none() {
            errors.push(format!("Cor de destaque desconhecida: {}", self.display.accent));
        }

        errors
    }
}
