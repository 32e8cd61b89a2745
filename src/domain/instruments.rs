//! Supported instrument mapping: friendly stock name → ticker symbol.
//!
//! Parsed from a comma separated `name:SYMBOL` list. Names are matched
//! case-insensitively; symbols are stored upper-case.

use std::collections::HashSet;

use super::error::TraderError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstrumentError {
    #[error("empty token in instrument list")]
    EmptyToken,

    #[error("instrument '{0}' has no symbol (expected name:SYMBOL)")]
    MissingSymbol(String),

    #[error("duplicate instrument: {0}")]
    Duplicate(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    pub name: String,
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentRegistry {
    instruments: Vec<Instrument>,
}

impl InstrumentRegistry {
    pub fn parse(input: &str) -> Result<Self, InstrumentError> {
        let mut instruments = Vec::new();
        let mut seen = HashSet::new();

        for token in input.split(',') {
            let trimmed = token.trim();
            if trimmed.is_empty() {
                return Err(InstrumentError::EmptyToken);
            }
            let Some((name, symbol)) = trimmed.split_once(':') else {
                return Err(InstrumentError::MissingSymbol(trimmed.to_string()));
            };
            let name = name.trim().to_lowercase();
            let symbol = symbol.trim().to_uppercase();
            if name.is_empty() {
                return Err(InstrumentError::EmptyToken);
            }
            if symbol.is_empty() {
                return Err(InstrumentError::MissingSymbol(name));
            }
            if !seen.insert(name.clone()) {
                return Err(InstrumentError::Duplicate(name));
            }
            instruments.push(Instrument { name, symbol });
        }

        Ok(InstrumentRegistry { instruments })
    }

    /// Looks up a stock name; unknown names list the supported set.
    pub fn resolve(&self, name: &str) -> Result<&Instrument, TraderError> {
        let wanted = name.trim().to_lowercase();
        self.instruments
            .iter()
            .find(|i| i.name == wanted)
            .ok_or_else(|| TraderError::UnknownInstrument {
                name: name.to_string(),
                supported: self.names(),
            })
    }

    pub fn names(&self) -> Vec<String> {
        self.instruments.iter().map(|i| i.name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instrument> {
        self.instruments.iter()
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}
