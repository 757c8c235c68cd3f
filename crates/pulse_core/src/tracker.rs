//! Janela deslizante por métrica.
//!
//! Cada [`MetricTracker`] guarda as últimas `W` leituras (FIFO de capacidade
//! fixa) atrás do seu próprio mutex: um sampler escreve, o loop de envio lê.

use crate::config::WindowConfig;
use crate::types::MetricsData;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// Acumulador de janela fixa que produz a média móvel de uma métrica.
#[derive(Debug)]
pub struct MetricTracker {
    window: usize,
    samples: Mutex<VecDeque<f64>>,
}

impl MetricTracker {
    /// Cria um tracker com janela `window` (mínimo 1).
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            samples: Mutex::new(VecDeque::with_capacity(window)),
        }
    }

    /// Adiciona uma leitura, descartando a mais antiga se a janela encheu.
    pub fn add(&self, value: f64) {
        let mut samples = self.lock();
        if samples.len() >= self.window {
            samples.pop_front();
        }
        samples.push_back(value);
    }

    /// Média das leituras atuais; `0.0` se vazio.
    pub fn average(&self) -> f64 {
        let samples = self.lock();
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().sum::<f64>() / samples.len() as f64
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.window
    }

    // Um writer que entrou em pânico não deixa a janela inconsistente:
    // são só floats, então o lock envenenado é recuperado.
    fn lock(&self) -> MutexGuard<'_, VecDeque<f64>> {
        self.samples.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Os seis trackers do sistema, compartilhados entre samplers e o link.
#[derive(Debug, Clone)]
pub struct MetricSet {
    pub cpu: Arc<MetricTracker>,
    pub memory: Arc<MetricTracker>,
    pub gpu: Arc<MetricTracker>,
    pub upload: Arc<MetricTracker>,
    pub download: Arc<MetricTracker>,
    pub disk: Arc<MetricTracker>,
}

impl MetricSet {
    pub fn new(windows: &WindowConfig) -> Self {
        Self {
            cpu: Arc::new(MetricTracker::new(windows.cpu)),
            memory: Arc::new(MetricTracker::new(windows.memory)),
            gpu: Arc::new(MetricTracker::new(windows.gpu)),
            upload: Arc::new(MetricTracker::new(windows.upload)),
            download: Arc::new(MetricTracker::new(windows.download)),
            disk: Arc::new(MetricTracker::new(windows.disk)),
        }
    }

    /// Lê a média de cada tracker e arredonda a 2 casas.
    ///
    /// Os trackers são lidos um a um; o snapshot não é atômico entre métricas.
    pub fn snapshot(&self) -> MetricsData {
        MetricsData {
            cpu: self.cpu.average(),
            memory: self.memory.average(),
            gpu: self.gpu.average(),
            upload: self.upload.average(),
            download: self.download.average(),
            disk: self.disk.average(),
        }
        .rounded()
    }
}

impl Default for MetricSet {
    fn default() -> Self {
        Self::new(&WindowConfig::default())
    }
}
