//! Definição das mensagens trocadas com o display.
//!
//! Três tipos de mensagem trafegam no link serial: handshake (identidade do
//! host), métricas suavizadas e comandos de tema. O formato exato no fio é
//! decidido pelo [`FrameCodec`](crate::protocol::FrameCodec) configurado.

use serde::{Deserialize, Serialize};

// ──────────────────────────────────────────────
// Métricas
// ──────────────────────────────────────────────

/// Snapshot das seis métricas suavizadas enviado a cada tick.
///
/// Percentuais em `0–100`, throughput em `0–9999.99` (Mbps por padrão).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricsData {
    /// Uso total da CPU (%)
    pub cpu: f64,
    /// Memória em uso (%)
    pub memory: f64,
    /// Carga da GPU (%)
    pub gpu: f64,
    /// Upload
    pub upload: f64,
    /// Download
    pub download: f64,
    /// Espaço usado somando todas as partições (%)
    pub disk: f64,
}

impl MetricsData {
    /// Valores na ordem do fio: cpu, memory, gpu, upload, download, disk.
    pub fn values(&self) -> [f64; 6] {
        [
            self.cpu,
            self.memory,
            self.gpu,
            self.upload,
            self.download,
            self.disk,
        ]
    }

    /// Retorna uma cópia com todos os campos arredondados a 2 casas.
    pub fn rounded(&self) -> Self {
        Self {
            cpu: round2(self.cpu),
            memory: round2(self.memory),
            gpu: round2(self.gpu),
            upload: round2(self.upload),
            download: round2(self.download),
            disk: round2(self.disk),
        }
    }
}

/// Arredonda para 2 casas decimais.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

// ──────────────────────────────────────────────
// Tema
// ──────────────────────────────────────────────

/// Comando de troca de tema/cor de destaque.
///
/// String vazia significa "manter o valor atual" no display.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThemeData {
    pub variant: String,
    pub accent: String,
}

// ──────────────────────────────────────────────
// Mensagem completa
// ──────────────────────────────────────────────

/// Mensagem enviada ao display.
///
/// Em JSON vira o envelope `{"type": ..., "data": ...}` que o firmware espera.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Message {
    /// Token de identidade do host
    Handshake(String),
    Metrics(MetricsData),
    Theme(ThemeData),
}

impl Message {
    /// Nome curto usado nos logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Handshake(_) => "handshake",
            Message::Metrics(_) => "metrics",
            Message::Theme(_) => "theme",
        }
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zeroed() {
        let m = MetricsData::default();
        assert!(m.values().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn rounding_keeps_two_decimals() {
        assert_eq!(round2(12.345_678), 12.35);
        assert_eq!(round2(9999.994), 9999.99);
        assert_eq!(round2(0.0), 0.0);

        let m = MetricsData {
            cpu: 33.333_333,
            upload: 1.005_1,
            ..Default::default()
        }
        .rounded();
        assert_eq!(m.cpu, 33.33);
        assert_eq!(m.upload, 1.01);
    }

    #[test]
    fn envelope_shape_matches_firmware() {
        let msg = Message::Theme(ThemeData {
            variant: "dark".into(),
            accent: String::new(),
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"theme","data":{"variant":"dark","accent":""}}"#);

        let hs = serde_json::to_string(&Message::Handshake("abc".into())).unwrap();
        assert_eq!(hs, r#"{"type":"handshake","data":"abc"}"#);
    }
}
