//! Temas e cores de destaque suportados pelo display.
//!
//! O host só escolhe nomes; a paleta é renderizada pelo firmware. As cores
//! hex (paleta Catppuccin Latte) servem para logs e validação.

use serde::{Deserialize, Serialize};

use crate::types::ThemeData;

/// Variante de tema do display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeVariant {
    Dark,
    Light,
}

impl ThemeVariant {
    pub const ALL: [ThemeVariant; 2] = [ThemeVariant::Dark, ThemeVariant::Light];

    pub fn as_str(self) -> &'static str {
        match self {
            ThemeVariant::Dark => "dark",
            ThemeVariant::Light => "light",
        }
    }

    /// Busca pelo nome (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|v| v.as_str() == name)
    }
}

/// Cor de destaque das barras do display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accent {
    Sapphire,
    Sky,
    Teal,
    Green,
    Peach,
    Maroon,
    Pink,
    Flamingo,
    Mauve,
    Lavender,
}

impl Accent {
    pub const ALL: [Accent; 10] = [
        Accent::Sapphire,
        Accent::Sky,
        Accent::Teal,
        Accent::Green,
        Accent::Peach,
        Accent::Maroon,
        Accent::Pink,
        Accent::Flamingo,
        Accent::Mauve,
        Accent::Lavender,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Accent::Sapphire => "sapphire",
            Accent::Sky => "sky",
            Accent::Teal => "teal",
            Accent::Green => "green",
            Accent::Peach => "peach",
            Accent::Maroon => "maroon",
            Accent::Pink => "pink",
            Accent::Flamingo => "flamingo",
            Accent::Mauve => "mauve",
            Accent::Lavender => "lavender",
        }
    }

    /// Cor "#RRGGBB" correspondente.
    pub fn hex(self) -> &'static str {
        match self {
            Accent::Sapphire => "#209fb5",
            Accent::Sky => "#04a5e5",
            Accent::Teal => "#179299",
            Accent::Green => "#40a02b",
            Accent::Peach => "#fe640b",
            Accent::Maroon => "#e64553",
            Accent::Pink => "#ea76cb",
            Accent::Flamingo => "#dd7878",
            Accent::Mauve => "#8839ef",
            Accent::Lavender => "#7287fd",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|a| a.as_str() == name)
    }
}

/// Monta o comando de tema. `None` deixa o campo vazio ("manter atual").
pub fn theme_command(variant: Option<ThemeVariant>, accent: Option<Accent>) -> ThemeData {
    ThemeData {
        variant: variant.map(|v| v.as_str().to_string()).unwrap_or_default(),
        accent: accent.map(|a| a.as_str().to_string()).unwrap_or_default(),
    }
}

/// Nomes de temas disponíveis.
pub fn theme_names() -> Vec<&'static str> {
    ThemeVariant::ALL.iter().map(|v| v.as_str()).collect()
}

/// Nomes de cores de destaque disponíveis.
pub fn accent_names() -> Vec<&'static str> {
    Accent::ALL.iter().map(|a| a.as_str()).collect()
}
