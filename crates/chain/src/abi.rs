//! ABI artifact checks.
//!
//! The bindings in [`contracts`](crate::contracts) are compiled in. An operator can point the
//! pipeline at the deployed contract's ABI artifact, and [`AbiSchema`] confirms it exposes
//! every event and function the pipeline is about to use before any RPC traffic happens.

use std::{fs, path::Path};

use alloy::{
    json_abi::JsonAbi,
    sol_types::{SolCall, SolEvent},
};
use thiserror::Error;

/// Errors raised while loading or checking an ABI artifact.
#[derive(Debug, Error)]
pub enum AbiError {
    /// The artifact could not be read.
    #[error("failed to read ABI artifact: {0}")]
    Io(#[from] std::io::Error),
    /// The artifact is not a JSON ABI or a build artifact with an `abi` field.
    #[error("failed to parse ABI artifact: {0}")]
    Parse(#[from] serde_json::Error),
    /// No event with the required signature.
    #[error("ABI is missing event {0}")]
    MissingEvent(&'static str),
    /// No function with the required signature.
    #[error("ABI is missing function {0}")]
    MissingFunction(&'static str),
}

/// A parsed contract ABI.
#[derive(Debug, Clone)]
pub struct AbiSchema {
    abi: JsonAbi,
}

impl AbiSchema {
    /// Loads a bare ABI array or a compiler artifact carrying one under `abi`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AbiError> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// Parses a bare ABI array or a compiler artifact carrying one under `abi`.
    pub fn from_json_str(s: &str) -> Result<Self, AbiError> {
        let value: serde_json::Value = serde_json::from_str(s)?;
        let abi = match value {
            serde_json::Value::Object(mut artifact) if artifact.contains_key("abi") => {
                serde_json::from_value(artifact.remove("abi").unwrap_or_default())?
            }
            other => serde_json::from_value(other)?,
        };
        Ok(Self { abi })
    }

    /// Confirms the ABI declares event `E` with a matching signature.
    pub fn require_event<E: SolEvent>(&self) -> Result<(), AbiError> {
        let found = self
            .abi
            .event(signature_name(E::SIGNATURE))
            .is_some_and(|events| events.iter().any(|e| e.selector() == E::SIGNATURE_HASH));
        if found { Ok(()) } else { Err(AbiError::MissingEvent(E::SIGNATURE)) }
    }

    /// Confirms the ABI declares function `C` with a matching selector.
    pub fn require_function<C: SolCall>(&self) -> Result<(), AbiError> {
        let found = self
            .abi
            .function(signature_name(C::SIGNATURE))
            .is_some_and(|functions| functions.iter().any(|f| f.selector().0 == C::SELECTOR));
        if found { Ok(()) } else { Err(AbiError::MissingFunction(C::SIGNATURE)) }
    }
}

fn signature_name(signature: &str) -> &str {
    signature.split('(').next().unwrap_or(signature)
}
