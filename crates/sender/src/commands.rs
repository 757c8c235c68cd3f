//! Comandos de tema digitados no terminal.
//!
//! ```text
//! theme dark            → {"variant":"dark","accent":""}
//! accent mauve          → {"variant":"","accent":"mauve"}
//! theme light peach     → {"variant":"light","accent":"peach"}
//! help
//! ```

use crate::link::{LinkError, LinkHandle};
use pulse_core::theme::{Accent, ThemeVariant, accent_names, theme_command, theme_names};
use pulse_core::types::ThemeData;
use std::io::BufRead;
use tracing::{debug, info, warn};

/// Linha do terminal já interpretada.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Theme(ThemeData),
    Help,
}

/// Linha que não pôde ser interpretada.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Tema desconhecido: {0:?} (disponíveis: {names})", names = theme_names().join(", "))]
    UnknownTheme(String),

    #[error("Cor de destaque desconhecida: {0:?} (disponíveis: {names})", names = accent_names().join(", "))]
    UnknownAccent(String),

    #[error("Argumento faltando para {0:?}")]
    MissingArgument(&'static str),

    #[error("Comando desconhecido: {0:?} (digite help)")]
    Unknown(String),
}

/// Interpreta uma linha. Linha vazia = `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };

    let command = match verb.to_lowercase().as_str() {
        "theme" | "tema" => {
            let variant = words.next().ok_or(CommandError::MissingArgument("theme"))?;
            let variant = parse_variant(variant)?;
            let accent = words.next().map(parse_accent).transpose()?;
            Command::Theme(theme_command(Some(variant), accent))
        }
        "accent" | "cor" => {
            let accent = words.next().ok_or(CommandError::MissingArgument("accent"))?;
            Command::Theme(theme_command(None, Some(parse_accent(accent)?)))
        }
        "help" | "ajuda" | "?" => Command::Help,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn parse_variant(name: &str) -> Result<ThemeVariant, CommandError> {
    ThemeVariant::from_name(name).ok_or_else(|| CommandError::UnknownTheme(name.to_string()))
}

fn parse_accent(name: &str) -> Result<Accent, CommandError> {
    Accent::from_name(name).ok_or_else(|| CommandError::UnknownAccent(name.to_string()))
}

/// Texto de ajuda impresso pelo comando `help`.
pub fn help_text() -> String {
    let accents: Vec<String> = Accent::ALL
        .iter()
        .map(|a| format!("{:<10} {}", a.as_str(), a.hex()))
        .collect();
    format!(
        "Comandos:\n  theme <{}> [cor]\n  accent <cor>\n  help\nCores:\n  {}",
        theme_names().join("|"),
        accents.join("\n  ")
    )
}

/// Lê comandos até EOF e os envia pelo link.
///
/// Erros de interpretação ou de envio são só logados.
pub fn run_console<R: BufRead>(reader: R, handle: &LinkHandle) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Erro ao ler o terminal: {e}");
                break;
            }
        };

        match parse_command(&line) {
            Ok(None) => {}
            Ok(Some(Command::Help)) => println!("{}", help_text()),
            Ok(Some(Command::Theme(theme))) => match handle.send_theme(theme) {
                Ok(()) => {}
                Err(LinkError::NotConnected) => {
                    info!("Display não conectado, comando descartado")
                }
                Err(e) => warn!("{e}"),
            },
            Err(e) => warn!("{e}"),
        }
    }
    debug!("Terminal fechado, comandos encerrados");
}
