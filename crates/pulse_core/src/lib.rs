//! # Pulse Core
//!
//! Crate compartilhada que define as mensagens do link serial, os codecs de
//! frame, os trackers de média móvel e a configuração TOML do Pulse Monitor.
//!
//! ## Módulos
//! - [`types`] – Mensagens (handshake, métricas, tema)
//! - [`protocol`] – Codecs de frame auto-delimitados (JSON, JSON plano, bincode+SLIP)
//! - [`tracker`] – Janela deslizante por métrica
//! - [`config`] – Configuração unificada via TOML
//! - [`theme`] – Temas e cores de destaque do display

pub mod types;
pub mod protocol;
pub mod tracker;
pub mod config;
pub mod theme;

// Re-exports convenientes
pub use types::{Message, MetricsData, ThemeData};
pub use protocol::{CodecError, Encoding, FrameCodec};
pub use tracker::{MetricSet, MetricTracker};
pub use config::AppConfig;
