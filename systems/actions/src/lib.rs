#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Action controller that validates and applies unit commands.
//!
//! A controller is bound to one entity. [`ActionController::validate`] only
//! reads the tree and reports a [`ResultCode`]; [`ActionController::apply`]
//! re-validates, commits, and appends every side effect to the caller's
//! buffer in resolution order. Every failure path returns before the first
//! mutation.

mod conversion;
mod explosion;
mod growth;
mod movement;
mod resolution;
mod spawning;
mod split;

use std::time::Duration;

use voxel_battle_core::{
    default_height, AbilityTable, Command, Coordinate, Direction, Effect, EntityId, Owner,
    ResultCode, VoxelAbilities, VoxelKind,
};
use voxel_battle_world::{CellId, RecordSpec, VoxelTree, WorldError};

pub use resolution::{classify, eat_gain, Interaction};

/// Last resolution the controller committed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Targeting {
    /// Record engaged by the last move or explosion, if any.
    pub last_target: Option<EntityId>,
    /// Coordinate the last move landed on or the last explosion aimed at.
    pub last_destination: Option<Coordinate>,
}

/// Executes commands on behalf of one entity.
///
/// Cloning yields an independent controller with its own targeting state;
/// clones only share the read-only ability table.
#[derive(Clone, Debug)]
pub struct ActionController<'a> {
    entity: EntityId,
    abilities: &'a AbilityTable,
    targeting: Targeting,
}

impl<'a> ActionController<'a> {
    /// Creates a controller bound to `entity`.
    #[must_use]
    pub fn new(entity: EntityId, abilities: &'a AbilityTable) -> Self {
        Self {
            entity,
            abilities,
            targeting: Targeting::default(),
        }
    }

    /// Entity the controller currently acts for.
    #[must_use]
    pub const fn entity(&self) -> EntityId {
        self.entity
    }

    /// Last committed resolution.
    #[must_use]
    pub const fn targeting(&self) -> Targeting {
        self.targeting
    }

    /// Binds the controller to another entity and clears its targeting.
    pub fn rebind(&mut self, entity: EntityId) {
        self.entity = entity;
        self.targeting = Targeting::default();
    }

    /// Configured duration of `command` for the bound entity.
    ///
    /// Unknown entities report a zero duration.
    #[must_use]
    pub fn duration_of(&self, tree: &VoxelTree, command: &Command) -> Duration {
        tree.record(self.entity).map_or(Duration::ZERO, |record| {
            self.abilities
                .lookup(record.owner(), record.kind())
                .duration_of(command)
        })
    }

    /// Checks whether `command` would succeed without touching the tree.
    #[must_use]
    pub fn validate(&self, tree: &VoxelTree, command: &Command) -> ResultCode {
        match self.plan(tree, command) {
            Ok(_) => ResultCode::SUCCESS,
            Err(code) => code,
        }
    }

    /// Validates and commits `command`, appending its effects to `out`.
    pub fn apply(
        &mut self,
        tree: &mut VoxelTree,
        command: Command,
        out: &mut Vec<Effect>,
    ) -> ResultCode {
        let entity = self.entity;
        let plan = match self.plan(tree, &command) {
            Ok(plan) => plan,
            Err(code) => {
                tracing::debug!(
                    target: "voxel_battle::actions",
                    entity = entity.get(),
                    command = command.name(),
                    %code,
                    "command.rejected"
                );
                return code;
            }
        };

        let emitted = out.len();
        match self.commit(tree, plan, out) {
            Ok(()) => {
                tracing::debug!(
                    target: "voxel_battle::actions",
                    entity = entity.get(),
                    bound = self.entity.get(),
                    command = command.name(),
                    effects = out.len() - emitted,
                    "command.applied"
                );
                ResultCode::SUCCESS
            }
            Err(error) => {
                tracing::error!(
                    target: "voxel_battle::actions",
                    entity = entity.get(),
                    command = command.name(),
                    %error,
                    "validated command failed to commit"
                );
                ResultCode::INVALID_OPERATION
            }
        }
    }

    fn plan(&self, tree: &VoxelTree, command: &Command) -> Result<Plan<'a>, ResultCode> {
        let mover = Mover::read(tree, self.abilities, self.entity)?;
        let plan = match command {
            Command::Move { to, is_last_step } => {
                Plan::Move(movement::validate(&mover, tree, *to, *is_last_step)?)
            }
            Command::Explode { to, target } => {
                Plan::Explode(explosion::validate(&mover, tree, *to, *target)?)
            }
            Command::Split => Plan::Split(split::validate_split(&mover, tree)?),
            Command::Split4 => Plan::Split4(split::validate_split4(&mover, tree)?),
            Command::Grow => Plan::Resize(growth::validate_grow(&mover, tree)?),
            Command::Diminish => Plan::Resize(growth::validate_diminish(&mover, tree)?),
            Command::Convert { kind } => {
                Plan::Convert(conversion::validate(&mover, tree, *kind)?)
            }
            Command::Spawn => Plan::Spawn(spawning::validate(&mover, tree)?),
        };
        Ok(plan)
    }

    fn commit(
        &mut self,
        tree: &mut VoxelTree,
        plan: Plan<'a>,
        out: &mut Vec<Effect>,
    ) -> Result<(), WorldError> {
        match plan {
            Plan::Move(plan) => {
                self.targeting = Targeting {
                    last_target: plan.target,
                    last_destination: Some(plan.destination()),
                };
                movement::commit(tree, plan, out)
            }
            Plan::Explode(plan) => {
                self.targeting = Targeting {
                    last_target: Some(plan.target),
                    last_destination: Some(plan.aimed_at),
                };
                explosion::commit(tree, plan, out)
            }
            Plan::Split(plan) => {
                let bound = split::commit_split(tree, plan, out)?;
                self.entity = bound;
                Ok(())
            }
            Plan::Split4(plan) => {
                let bound = split::commit_split4(tree, plan, out)?;
                self.entity = bound;
                Ok(())
            }
            Plan::Resize(plan) => growth::commit(tree, plan, out),
            Plan::Convert(plan) => {
                let bound = conversion::commit(tree, plan, out)?;
                self.entity = bound;
                Ok(())
            }
            Plan::Spawn(plan) => spawning::commit(tree, plan, out),
        }
    }
}

enum Plan<'a> {
    Move(movement::MovePlan<'a>),
    Explode(explosion::ExplodePlan<'a>),
    Split(split::SplitPlan<'a>),
    Split4(split::Split4Plan<'a>),
    Resize(growth::ResizePlan<'a>),
    Convert(conversion::ConvertPlan<'a>),
    Spawn(spawning::SpawnPlan<'a>),
}

/// State of the bound entity captured when a command is validated.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Mover<'a> {
    pub(crate) id: EntityId,
    pub(crate) kind: VoxelKind,
    pub(crate) owner: Owner,
    pub(crate) weight: i32,
    pub(crate) health: i32,
    pub(crate) height: i32,
    pub(crate) altitude: i32,
    pub(crate) facing: Direction,
    pub(crate) collapsed: bool,
    pub(crate) cell: CellId,
    pub(crate) coordinate: Coordinate,
    pub(crate) abilities: &'a VoxelAbilities,
    pub(crate) table: &'a AbilityTable,
}

impl<'a> Mover<'a> {
    fn read(tree: &VoxelTree, table: &'a AbilityTable, id: EntityId) -> Result<Self, ResultCode> {
        let record = tree
            .record(id)
            .filter(|record| record.is_alive())
            .ok_or(ResultCode::NO_UNIT)?;
        let cell = record.cell().ok_or(ResultCode::NO_UNIT)?;
        let coordinate = tree.coordinate_of(id).ok_or(ResultCode::NO_UNIT)?;
        Ok(Self {
            id,
            kind: record.kind(),
            owner: record.owner(),
            weight: record.weight(),
            health: record.health(),
            height: record.height(),
            altitude: record.altitude(),
            facing: record.facing(),
            collapsed: record.is_collapsed(),
            cell,
            coordinate,
            abilities: table.lookup(record.owner(), record.kind()),
            table,
        })
    }

    /// Rejects collapsed movers and movers something rests on.
    pub(crate) fn ensure_free(&self, tree: &VoxelTree) -> Result<(), ResultCode> {
        if self.collapsed || tree.is_covered(self.id) {
            return Err(ResultCode::COLLAPSED_OR_BLOCKED);
        }
        Ok(())
    }

    /// Fresh record of the mover's kind and owner with default health.
    pub(crate) fn offspring(&self, weight: i32, height: i32, altitude: i32) -> RecordSpec {
        RecordSpec {
            kind: self.kind,
            owner: self.owner,
            weight,
            health: self.abilities.default_health.max(1),
            height,
            altitude,
            facing: self.facing,
        }
    }

    /// Default-sized offspring at the mover's own weight.
    pub(crate) fn clone_spec(&self, altitude: i32) -> RecordSpec {
        self.offspring(self.weight, default_height(self.weight), altitude)
    }
}

/// Runs `fallback` once when `primary` failed softly.
pub(crate) fn with_fallback<P>(
    primary: Result<P, ResultCode>,
    fallback: impl FnOnce() -> Result<P, ResultCode>,
) -> Result<P, ResultCode> {
    match primary {
        Err(code) if !code.is_hard_fail() => fallback(),
        other => other,
    }
}

/// Resolves a coordinate the validator already bounds-checked.
pub(crate) fn cell_at(tree: &VoxelTree, coordinate: Coordinate) -> Result<CellId, ResultCode> {
    tree.locate(coordinate)
        .map_err(|_| ResultCode::INVALID_ARGUMENTS)
}
