//! Codificação das mensagens para o link serial.
//!
//! Toda mensagem vira um frame auto-delimitado: o corpo codificado seguido de
//! **um** byte delimitador que nunca aparece dentro do corpo. O receptor só
//! precisa acumular bytes até o delimitador.
//!
//! ```text
//! json_envelope  {"type":"metrics","data":{"cpu":12.5,...}}\n
//! flat_json      {"cpu":12.5,"memory":40.1,...}\n
//! binary         SLIP(bincode(msg)) 0xC0
//! ```
//!
//! JSON compacto nunca contém `\n` literal (strings escapam o caractere), e o
//! escape SLIP (RFC 1055) remove todo `0xC0` do corpo binário.

use crate::types::{Message, MetricsData};
use serde::{Deserialize, Serialize};

/// Delimitador dos encodings de texto.
pub const TEXT_DELIMITER: u8 = b'\n';

/// Byte END do SLIP, delimitador do encoding binário.
pub const SLIP_END: u8 = 0xC0;
const SLIP_ESC: u8 = 0xDB;
const SLIP_ESC_END: u8 = 0xDC;
const SLIP_ESC_ESC: u8 = 0xDD;

/// Erros de codificação.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Métrica {field} não é finita: {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("Token de handshake inválido: {0:?}")]
    InvalidToken(String),

    #[error("Erro de serialização: {0}")]
    Serialize(String),
}

/// Estratégia de serialização de um frame.
pub trait FrameCodec: Send + Sync {
    /// Codifica a mensagem, já com o delimitador final.
    fn encode(&self, msg: &Message) -> Result<Vec<u8>, CodecError>;

    /// Byte que termina cada frame.
    fn delimiter(&self) -> u8;

    /// Nome usado em logs e na configuração.
    fn name(&self) -> &'static str;
}

/// Encodings disponíveis na configuração.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// `{"type": ..., "data": ...}` – formato do firmware atual
    #[default]
    JsonEnvelope,
    /// Mapa plano só com os valores, sem envelope
    FlatJson,
    /// bincode com framing SLIP
    Binary,
}

impl Encoding {
    /// Instancia o codec correspondente.
    pub fn codec(self) -> Box<dyn FrameCodec> {
        match self {
            Encoding::JsonEnvelope => Box::new(JsonEnvelopeCodec),
            Encoding::FlatJson => Box::new(FlatJsonCodec),
            Encoding::Binary => Box::new(BinaryCodec),
        }
    }
}

// ──────────────────────────────────────────────
// Codecs
// ──────────────────────────────────────────────

/// JSON com envelope `{type, data}` terminado em `\n`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEnvelopeCodec;

impl FrameCodec for JsonEnvelopeCodec {
    fn encode(&self, msg: &Message) -> Result<Vec<u8>, CodecError> {
        validate(msg)?;
        let mut frame =
            serde_json::to_vec(msg).map_err(|e| CodecError::Serialize(e.to_string()))?;
        frame.push(TEXT_DELIMITER);
        Ok(frame)
    }

    fn delimiter(&self) -> u8 {
        TEXT_DELIMITER
    }

    fn name(&self) -> &'static str {
        "json_envelope"
    }
}

/// JSON plano, sem envelope. O handshake vai como a linha crua do token.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatJsonCodec;

impl FrameCodec for FlatJsonCodec {
    fn encode(&self, msg: &Message) -> Result<Vec<u8>, CodecError> {
        validate(msg)?;
        let mut frame = match msg {
            Message::Handshake(token) => token.as_bytes().to_vec(),
            Message::Metrics(m) => to_json(m)?,
            Message::Theme(t) => to_json(t)?,
        };
        frame.push(TEXT_DELIMITER);
        Ok(frame)
    }

    fn delimiter(&self) -> u8 {
        TEXT_DELIMITER
    }

    fn name(&self) -> &'static str {
        "flat_json"
    }
}

/// bincode + SLIP, terminado em `0xC0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec;

/// Representação binária: enum externamente tagueado (índice u32 no bincode).
#[derive(Serialize)]
enum BinaryMessage<'a> {
    Handshake(&'a str),
    Metrics(&'a MetricsData),
    Theme(&'a crate::types::ThemeData),
}

impl FrameCodec for BinaryCodec {
    fn encode(&self, msg: &Message) -> Result<Vec<u8>, CodecError> {
        validate(msg)?;
        let wire = match msg {
            Message::Handshake(token) => BinaryMessage::Handshake(token),
            Message::Metrics(m) => BinaryMessage::Metrics(m),
            Message::Theme(t) => BinaryMessage::Theme(t),
        };
        let body = bincode::serialize(&wire).map_err(|e| CodecError::Serialize(e.to_string()))?;
        Ok(slip_encode(&body))
    }

    fn delimiter(&self) -> u8 {
        SLIP_END
    }

    fn name(&self) -> &'static str {
        "binary"
    }
}

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(value).map_err(|e| CodecError::Serialize(e.to_string()))
}

/// Rejeita o que não pode ir para o fio sem corromper o framing.
///
/// `serde_json` escreveria `null` para NaN/∞, que o firmware não entende.
fn validate(msg: &Message) -> Result<(), CodecError> {
    match msg {
        Message::Handshake(token) => {
            if token.is_empty() || token.bytes().any(|b| b == TEXT_DELIMITER || b == b'\r') {
                return Err(CodecError::InvalidToken(token.clone()));
            }
        }
        Message::Metrics(m) => {
            const FIELDS: [&str; 6] = ["cpu", "memory", "gpu", "upload", "download", "disk"];
            for (field, value) in FIELDS.into_iter().zip(m.values()) {
                if !value.is_finite() {
                    return Err(CodecError::NonFinite { field, value });
                }
            }
        }
        Message::Theme(_) => {}
    }
    Ok(())
}

/// Escapa o corpo com SLIP e acrescenta o END.
pub fn slip_encode(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + body.len() / 8 + 1);
    for &b in body {
        match b {
            SLIP_END => out.extend_from_slice(&[SLIP_ESC, SLIP_ESC_END]),
            SLIP_ESC => out.extend_from_slice(&[SLIP_ESC, SLIP_ESC_ESC]),
            _ => out.push(b),
        }
    }
    out.push(SLIP_END);
    out
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
