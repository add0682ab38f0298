//! Static per-kind ability table consumed by the action controllers.
//!
//! The table is loaded once from TOML, or falls back to the built-in values,
//! and is passed by reference into every controller. Lookups are keyed by
//! `(owner, kind)`: per-owner overrides win over the per-kind defaults.

use std::{
    env, fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Command, Owner, VoxelKind};

/// Environment variable naming an ability table to load instead of the built-in one.
pub const ABILITIES_PATH_ENV: &str = "VOXEL_BATTLE_ABILITIES";

/// Movement limits, bounds and durations for one kind of entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoxelAbilities {
    /// Lowest tree weight the kind may occupy.
    pub min_weight: i32,
    /// Highest tree weight the kind may occupy.
    pub max_weight: i32,
    /// Health assigned to freshly created records.
    pub default_health: i32,
    /// Lower clamp applied after health gains.
    pub min_health: i32,
    /// Upper clamp applied after health gains; split and grow require it.
    pub max_health: i32,
    /// Highest climb per step, in multiples of the entity's own height.
    pub max_jump_height: i32,
    /// Deepest drop per step, in multiples of the entity's own height.
    pub max_fall_height: i32,
    /// Victims above this health cannot be eaten.
    pub eat_health_ceiling: i32,
    /// Largest weight difference between a detonating entity and its target.
    pub explode_weight_delta: i32,
    /// The kind may step between cells.
    pub can_move: bool,
    /// The kind may split into two.
    pub can_split: bool,
    /// The kind may split into four.
    pub can_split4: bool,
    /// The kind may grow one level.
    pub can_grow: bool,
    /// The kind may diminish one level.
    pub can_diminish: bool,
    /// The kind may convert into another kind.
    pub can_convert: bool,
    /// The kind may detonate.
    pub can_explode: bool,
    /// Kind emitted by the spawn action, if any.
    pub spawn_kind: Option<VoxelKind>,
    /// Health paid by a spawner for every emitted entity.
    pub spawn_health_cost: i32,
    /// Duration of one movement step in milliseconds.
    pub movement_duration_ms: u64,
    /// Duration of split and split4 in milliseconds.
    pub split_duration_ms: u64,
    /// Duration of grow and diminish in milliseconds.
    pub grow_duration_ms: u64,
    /// Duration of convert in milliseconds.
    pub convert_duration_ms: u64,
    /// Duration of explode in milliseconds.
    pub explode_duration_ms: u64,
    /// Duration of spawn in milliseconds.
    pub spawn_duration_ms: u64,
}

impl Default for VoxelAbilities {
    fn default() -> Self {
        Self {
            min_weight: 0,
            max_weight: 12,
            default_health: 1,
            min_health: 1,
            max_health: 1,
            max_jump_height: 0,
            max_fall_height: 0,
            eat_health_ceiling: 0,
            explode_weight_delta: 0,
            can_move: false,
            can_split: false,
            can_split4: false,
            can_grow: false,
            can_diminish: false,
            can_convert: false,
            can_explode: false,
            spawn_kind: None,
            spawn_health_cost: 0,
            movement_duration_ms: 0,
            split_duration_ms: 0,
            grow_duration_ms: 0,
            convert_duration_ms: 0,
            explode_duration_ms: 0,
            spawn_duration_ms: 0,
        }
    }
}

impl VoxelAbilities {
    /// Built-in abilities of terrain.
    #[must_use]
    pub fn ground() -> Self {
        Self {
            default_health: 3,
            max_health: 3,
            ..Self::default()
        }
    }

    /// Built-in abilities of indestructible terrain.
    #[must_use]
    pub fn obstacle() -> Self {
        Self::default()
    }

    /// Built-in abilities of neutral food.
    #[must_use]
    pub fn eatable() -> Self {
        Self {
            max_weight: 4,
            ..Self::default()
        }
    }

    /// Built-in abilities of the basic unit.
    #[must_use]
    pub fn eater() -> Self {
        Self {
            min_weight: 0,
            max_weight: 6,
            default_health: 8,
            min_health: 1,
            max_health: 16,
            max_jump_height: 1,
            max_fall_height: 2,
            eat_health_ceiling: 16,
            explode_weight_delta: 1,
            can_move: true,
            can_split: true,
            can_split4: true,
            can_grow: true,
            can_diminish: true,
            can_convert: true,
            movement_duration_ms: 250,
            split_duration_ms: 1_000,
            grow_duration_ms: 1_000,
            convert_duration_ms: 1_500,
            ..Self::default()
        }
    }

    /// Built-in abilities of the detonating unit.
    #[must_use]
    pub fn bomb() -> Self {
        Self {
            min_weight: 0,
            max_weight: 4,
            default_health: 4,
            min_health: 1,
            max_health: 4,
            max_jump_height: 1,
            max_fall_height: 2,
            explode_weight_delta: 1,
            can_move: true,
            can_convert: true,
            can_explode: true,
            movement_duration_ms: 400,
            convert_duration_ms: 1_500,
            explode_duration_ms: 100,
            ..Self::default()
        }
    }

    /// Built-in abilities of the spawning unit.
    #[must_use]
    pub fn spawner() -> Self {
        Self {
            min_weight: 2,
            max_weight: 6,
            default_health: 16,
            min_health: 1,
            max_health: 16,
            can_convert: true,
            spawn_kind: Some(VoxelKind::Eater),
            spawn_health_cost: 0,
            convert_duration_ms: 1_500,
            spawn_duration_ms: 2_000,
            ..Self::default()
        }
    }

    /// Duration configured for the provided command.
    #[must_use]
    pub fn duration_of(&self, command: &Command) -> Duration {
        let millis = match command {
            Command::Move { .. } => self.movement_duration_ms,
            Command::Split | Command::Split4 => self.split_duration_ms,
            Command::Grow | Command::Diminish => self.grow_duration_ms,
            Command::Convert { .. } => self.convert_duration_ms,
            Command::Explode { .. } => self.explode_duration_ms,
            Command::Spawn => self.spawn_duration_ms,
        };
        Duration::from_millis(millis)
    }
}

/// Per-owner replacement of one kind's abilities.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerOverride {
    /// Player the override applies to.
    pub owner: Owner,
    /// Kind the override applies to.
    pub kind: VoxelKind,
    /// Abilities used instead of the per-kind defaults.
    #[serde(default)]
    pub abilities: VoxelAbilities,
}

/// Read-only ability table keyed by `(owner, kind)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbilityTable {
    /// Abilities of [`VoxelKind::Ground`].
    pub ground: VoxelAbilities,
    /// Abilities of [`VoxelKind::Obstacle`].
    pub obstacle: VoxelAbilities,
    /// Abilities of [`VoxelKind::Eatable`].
    pub eatable: VoxelAbilities,
    /// Abilities of [`VoxelKind::Eater`].
    pub eater: VoxelAbilities,
    /// Abilities of [`VoxelKind::Bomb`].
    pub bomb: VoxelAbilities,
    /// Abilities of [`VoxelKind::Spawner`].
    pub spawner: VoxelAbilities,
    /// Per-owner replacements, first match wins.
    pub overrides: Vec<OwnerOverride>,
}

impl Default for AbilityTable {
    fn default() -> Self {
        Self {
            ground: VoxelAbilities::ground(),
            obstacle: VoxelAbilities::obstacle(),
            eatable: VoxelAbilities::eatable(),
            eater: VoxelAbilities::eater(),
            bomb: VoxelAbilities::bomb(),
            spawner: VoxelAbilities::spawner(),
            overrides: Vec::new(),
        }
    }
}

impl AbilityTable {
    /// Parses a table from TOML; omitted sections keep their built-in values.
    pub fn from_toml_str(contents: &str) -> Result<Self, AbilityConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Reads and parses a table from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, AbilityConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| AbilityConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Loads the table named by [`ABILITIES_PATH_ENV`], falling back to the built-in table.
    #[must_use]
    pub fn load_from_env() -> Self {
        let Some(path) = env::var_os(ABILITIES_PATH_ENV).map(PathBuf::from) else {
            tracing::info!(target: "voxel_battle::config", "abilities.loaded=builtin");
            return Self::default();
        };

        match Self::from_file(&path) {
            Ok(table) => {
                tracing::info!(
                    target: "voxel_battle::config",
                    path = %path.display(),
                    "abilities.loaded=file"
                );
                table
            }
            Err(err) => {
                tracing::warn!(
                    target: "voxel_battle::config",
                    path = %path.display(),
                    error = %err,
                    "abilities.load_failed"
                );
                Self::default()
            }
        }
    }

    /// Abilities of `kind` for `owner`.
    #[must_use]
    pub fn lookup(&self, owner: Owner, kind: VoxelKind) -> &VoxelAbilities {
        self.overrides
            .iter()
            .find(|entry| entry.owner == owner && entry.kind == kind)
            .map_or_else(|| self.for_kind(kind), |entry| &entry.abilities)
    }

    /// Per-kind defaults, ignoring overrides.
    #[must_use]
    pub fn for_kind(&self, kind: VoxelKind) -> &VoxelAbilities {
        match kind {
            VoxelKind::Ground => &self.ground,
            VoxelKind::Obstacle => &self.obstacle,
            VoxelKind::Eatable => &self.eatable,
            VoxelKind::Eater => &self.eater,
            VoxelKind::Bomb => &self.bomb,
            VoxelKind::Spawner => &self.spawner,
        }
    }
}

/// Errors raised while loading an ability table.
#[derive(Debug, Error)]
pub enum AbilityConfigError {
    /// The TOML contents could not be parsed.
    #[error("failed to parse ability table: {0}")]
    Parse(#[from] toml::de::Error),
    /// The file could not be read.
    #[error("failed to read ability table from {path:?}: {source}")]
    Read {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
}
