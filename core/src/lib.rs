#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Voxel Battle engine.
//!
//! This crate defines the message surface that connects the match engine,
//! the authoritative voxel tree, and the action controllers. Callers submit
//! [`Command`] values on behalf of one controlled entity, the controller
//! validates them into a [`ResultCode`], and applied commands report every
//! side effect as an ordered list of [`Effect`] values that rendering and
//! replication collaborators consume.

pub mod abilities;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

pub use abilities::{AbilityConfigError, AbilityTable, OwnerOverride, VoxelAbilities};

/// Commands that a controller can execute for its bound entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Steps the entity into an axis-adjacent cell at its own weight.
    Move {
        /// Destination coordinate, including the altitude the caller expects.
        to: Coordinate,
        /// Marks the final step of a multi-step path.
        is_last_step: bool,
    },
    /// Detonates the entity against a target record.
    Explode {
        /// Coordinate at which the target is expected.
        to: Coordinate,
        /// Record the explosion is aimed at.
        target: EntityId,
    },
    /// Replaces the entity with two default clones side by side.
    Split,
    /// Replaces the entity with four half-height clones, one per child quadrant.
    Split4,
    /// Moves the entity one level up the tree, doubling its height.
    Grow,
    /// Moves the entity one level down the tree, halving its height.
    Diminish,
    /// Swaps the entity's kind in place.
    Convert {
        /// Kind the entity turns into.
        kind: VoxelKind,
    },
    /// Emits a new default entity on top of a spawner.
    Spawn,
}

impl Command {
    /// Short stable name used by logs and duration lookups.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Move { .. } => "move",
            Self::Explode { .. } => "explode",
            Self::Split => "split",
            Self::Split4 => "split4",
            Self::Grow => "grow",
            Self::Diminish => "diminish",
            Self::Convert { .. } => "convert",
            Self::Spawn => "spawn",
        }
    }
}

/// Side effects reported by an applied command, in resolution order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// A record was absorbed by the acting entity.
    Eat {
        /// Entity that absorbed the victim.
        attacker: EntityId,
        /// Record that was absorbed and removed.
        victim: EntityId,
        /// Health actually added to the attacker after clamping.
        health_gained: i32,
        /// Health the victim held when it was absorbed.
        victim_health_lost: i32,
    },
    /// A record was crushed in place; it keeps occupying its cell.
    Collapse {
        /// Record that collapsed.
        entity: EntityId,
        /// Distance the record fell before collapsing.
        fall_distance: i32,
    },
    /// A previously collapsed record regained its height.
    Expand {
        /// Record that expanded.
        entity: EntityId,
    },
    /// A record took explosion damage.
    Explode {
        /// Record that exploded or was caught by the blast.
        entity: EntityId,
        /// Health removed by the blast.
        health_lost: i32,
    },
    /// A record died and was unlinked from the tree.
    Die {
        /// Record that died.
        entity: EntityId,
    },
    /// A record was created by the command.
    Create {
        /// Identifier allocated for the new record.
        entity: EntityId,
        /// Coordinate the new record occupies.
        at: Coordinate,
    },
}

bitflags! {
    /// Outcome of validating or applying a command.
    ///
    /// Codes form a hierarchy: every refinement contains the bits of its
    /// parent, so `code.is(ResultCode::INVALID_OPERATION)` holds for
    /// `MIN_WEIGHT` as well. The empty set is success.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ResultCode: u32 {
        /// Generic failure; retrying with other parameters may succeed.
        const FAIL = 1;
        /// Marks a failure that must not be retried unmodified.
        const NON_RETRYABLE = 1 << 1;
        /// Categorically invalid request.
        const HARD_FAIL = Self::FAIL.bits() | Self::NON_RETRYABLE.bits();
        /// The entity's kind does not support the action.
        const NOT_SUPPORTED = Self::HARD_FAIL.bits() | 1 << 2;
        /// The action is invalid in the entity's current configuration.
        const INVALID_OPERATION = Self::HARD_FAIL.bits() | 1 << 3;
        /// The entity is already at its minimum weight.
        const MIN_WEIGHT = Self::INVALID_OPERATION.bits() | 1 << 4;
        /// The entity is already at its maximum weight.
        const MAX_WEIGHT = Self::INVALID_OPERATION.bits() | 1 << 5;
        /// The command arguments are malformed or out of bounds.
        const INVALID_ARGUMENTS = Self::HARD_FAIL.bits() | 1 << 6;
        /// The controlled entity does not exist or is dead.
        const NO_UNIT = Self::HARD_FAIL.bits() | 1 << 7;
        /// The entity cannot reach the destination.
        const UNABLE_TO_MOVE = Self::FAIL.bits() | 1 << 8;
        /// The entity is collapsed or something rests on it.
        const COLLAPSED_OR_BLOCKED =
            Self::UNABLE_TO_MOVE.bits() | Self::NON_RETRYABLE.bits() | 1 << 9;
        /// No valid placement exists at the location.
        const INVALID_LOCATION = Self::FAIL.bits() | 1 << 10;
        /// The record found at the location cannot be engaged.
        const INVALID_TARGET_LOCATION = Self::FAIL.bits() | 1 << 11;
        /// The entity lacks health or another resource.
        const NEED_MORE_RESOURCES = Self::FAIL.bits() | 1 << 12;
        /// Nothing suitable was found.
        const NOT_FOUND = Self::FAIL.bits() | 1 << 13;
    }
}

impl ResultCode {
    /// Successful validation or application.
    pub const SUCCESS: Self = Self::empty();

    const NAMED: [(Self, &'static str); 16] = [
        (Self::COLLAPSED_OR_BLOCKED, "collapsed_or_blocked"),
        (Self::MIN_WEIGHT, "min_weight"),
        (Self::MAX_WEIGHT, "max_weight"),
        (Self::NOT_SUPPORTED, "not_supported"),
        (Self::INVALID_OPERATION, "invalid_operation"),
        (Self::INVALID_ARGUMENTS, "invalid_arguments"),
        (Self::NO_UNIT, "no_unit"),
        (Self::UNABLE_TO_MOVE, "unable_to_move"),
        (Self::INVALID_LOCATION, "invalid_location"),
        (Self::INVALID_TARGET_LOCATION, "invalid_target_location"),
        (Self::NEED_MORE_RESOURCES, "need_more_resources"),
        (Self::NOT_FOUND, "not_found"),
        (Self::HARD_FAIL, "hard_fail"),
        (Self::FAIL, "fail"),
        (Self::NON_RETRYABLE, "non_retryable"),
        (Self::SUCCESS, "success"),
    ];

    /// Reports whether the code is success.
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.is_empty()
    }

    /// Reports whether the non-retryable bit is set.
    #[must_use]
    pub const fn is_hard_fail(self) -> bool {
        self.contains(Self::NON_RETRYABLE)
    }

    /// Reports whether the code is the provided code or one of its refinements.
    #[must_use]
    pub const fn is(self, code: Self) -> bool {
        if code.is_empty() {
            return self.is_empty();
        }
        self.contains(code)
    }

    /// Stable snake-case name of the exact code, if it is a named one.
    #[must_use]
    pub fn name(self) -> Option<&'static str> {
        Self::NAMED
            .iter()
            .find(|(code, _)| *code == self)
            .map(|(_, name)| *name)
    }
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{:#x}", self.bits()),
        }
    }
}

/// Unique identifier assigned to an entity record.
///
/// Identifiers are allocated monotonically by the tree and never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u32);

impl EntityId {
    /// Creates a new entity identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Player owning an entity. Zero is neutral.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Owner(u8);

impl Owner {
    /// Unowned entities such as terrain and food.
    pub const NEUTRAL: Self = Self(0);

    /// Creates an owner from its player index.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Retrieves the player index.
    #[must_use]
    pub const fn get(&self) -> u8 {
        self.0
    }

    /// Reports whether the owner is neutral.
    #[must_use]
    pub const fn is_neutral(&self) -> bool {
        self.0 == 0
    }

    /// Reports whether two owners are distinct, non-neutral players.
    #[must_use]
    pub const fn opposes(&self, other: Owner) -> bool {
        !self.is_neutral() && !other.is_neutral() && self.0 != other.0
    }
}

/// Cardinal directions on a tree level, clockwise from north.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Toward decreasing row indices.
    #[default]
    North,
    /// Toward increasing column indices.
    East,
    /// Toward increasing row indices.
    South,
    /// Toward decreasing column indices.
    West,
}

impl Direction {
    /// All directions in clockwise order starting at north.
    pub const ALL: [Direction; 4] = [Self::North, Self::East, Self::South, Self::West];

    /// Index of the direction inside [`Direction::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::North => 0,
            Self::East => 1,
            Self::South => 2,
            Self::West => 3,
        }
    }

    /// Row and column offsets of a single step.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (-1, 0),
            Self::East => (0, 1),
            Self::South => (1, 0),
            Self::West => (0, -1),
        }
    }

    /// The four directions in clockwise order starting at `self`.
    #[must_use]
    pub fn clockwise_from(self) -> [Direction; 4] {
        let start = self.index();
        [0, 1, 2, 3].map(|step| Self::ALL[(start + step) % 4])
    }
}

/// Address of a cell and a vertical offset inside its column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    /// Row index at `weight`.
    pub row: i32,
    /// Column index at `weight`.
    pub col: i32,
    /// Tree level; zero is the finest grid.
    pub weight: i32,
    /// Vertical offset used to order stacks.
    pub altitude: i32,
}

impl Coordinate {
    /// Creates a new coordinate.
    #[must_use]
    pub const fn new(row: i32, col: i32, weight: i32, altitude: i32) -> Self {
        Self {
            row,
            col,
            weight,
            altitude,
        }
    }

    /// Rescales row and column to another tree level.
    ///
    /// Moving to a coarser level truncates toward the containing cell; moving
    /// to a finer level selects the first (north-west) sub-cell.
    #[must_use]
    pub const fn at_weight(self, weight: i32) -> Self {
        let (row, col) = if weight >= self.weight {
            let shift = weight - self.weight;
            (self.row >> shift, self.col >> shift)
        } else {
            let shift = self.weight - weight;
            (self.row << shift, self.col << shift)
        };
        Self {
            row,
            col,
            weight,
            altitude: self.altitude,
        }
    }

    /// Coordinate one step away in the provided direction at the same weight.
    #[must_use]
    pub const fn step(self, direction: Direction) -> Self {
        let (row_offset, col_offset) = direction.offset();
        Self {
            row: self.row + row_offset,
            col: self.col + col_offset,
            weight: self.weight,
            altitude: self.altitude,
        }
    }

    /// Returns the same coordinate with a different altitude.
    #[must_use]
    pub const fn with_altitude(self, altitude: i32) -> Self {
        Self { altitude, ..self }
    }

    /// Manhattan distance between the row/column parts, ignoring weight.
    #[must_use]
    pub const fn manhattan_distance(self, other: Coordinate) -> u32 {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }

    /// Direction of an axis-adjacent coordinate at the same weight.
    #[must_use]
    pub fn direction_to(self, other: Coordinate) -> Option<Direction> {
        if self.weight != other.weight || self.manhattan_distance(other) != 1 {
            return None;
        }

        Direction::ALL
            .into_iter()
            .find(|direction| {
                let next = self.step(*direction);
                next.row == other.row && next.col == other.col
            })
    }
}

/// Kinds of voxel entities that can occupy the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoxelKind {
    /// Neutral terrain that supports everything.
    Ground,
    /// Terrain that supports but can never be engaged.
    Obstacle,
    /// Neutral food absorbed by eaters.
    Eatable,
    /// Controllable unit that moves and eats.
    Eater,
    /// Controllable unit that detonates.
    Bomb,
    /// Controllable unit that emits new units.
    Spawner,
}

impl VoxelKind {
    /// Every kind, in declaration order.
    pub const ALL: [VoxelKind; 6] = [
        Self::Ground,
        Self::Obstacle,
        Self::Eatable,
        Self::Eater,
        Self::Bomb,
        Self::Spawner,
    ];

    /// Reports whether the kind is a player-controllable unit.
    #[must_use]
    pub const fn is_unit(self) -> bool {
        matches!(self, Self::Eater | Self::Bomb | Self::Spawner)
    }

    /// Reports whether another record may land on top of this kind.
    #[must_use]
    pub const fn can_support(self) -> bool {
        !matches!(self, Self::Eatable)
    }

    /// Reports whether the kind is terrain rather than an occupant.
    #[must_use]
    pub const fn is_terrain(self) -> bool {
        matches!(self, Self::Ground | Self::Obstacle)
    }

    /// Reports whether the kind can be absorbed by an eater.
    #[must_use]
    pub const fn is_edible(self) -> bool {
        matches!(self, Self::Eatable | Self::Eater)
    }

    /// Reports whether the kind kills opposing units that step on it.
    #[must_use]
    pub const fn is_detonator(self) -> bool {
        matches!(self, Self::Bomb)
    }
}

/// Transient activity state of a controllable unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
    /// The unit has no pending task.
    #[default]
    Idle,
    /// The unit is executing a task issued by the match engine.
    Busy,
}

/// Default extent of a freshly created record at the provided weight.
#[must_use]
pub const fn default_height(weight: i32) -> i32 {
    if weight <= 0 {
        1
    } else {
        1 << weight
    }
}
