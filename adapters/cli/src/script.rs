//! TOML command scripts replayed against the battlefield.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use voxel_battle_core::{Command, Effect, EntityId, ResultCode};

/// Ordered list of commands issued on behalf of individual entities.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Script {
    #[serde(default)]
    pub(crate) step: Vec<ScriptStep>,
}

/// One scripted command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ScriptStep {
    pub(crate) entity: EntityId,
    pub(crate) command: Command,
}

impl Script {
    pub(crate) fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("failed to parse command script")
    }

    pub(crate) fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read command script {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("invalid command script {}", path.display()))
    }
}

/// Outcome of one scripted step, printed as a JSON line.
#[derive(Debug, Serialize)]
pub(crate) struct StepReport<'a> {
    pub(crate) step: usize,
    pub(crate) entity: EntityId,
    pub(crate) command: &'a str,
    pub(crate) result: &'a str,
    pub(crate) bound: EntityId,
    pub(crate) effects: &'a [Effect],
}

/// Stable label of a result code.
pub(crate) fn result_label(code: ResultCode) -> &'static str {
    code.name().unwrap_or("fail")
}
