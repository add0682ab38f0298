//! Entity records stacked inside cells.

use serde::{Deserialize, Serialize};
use voxel_battle_core::{Coordinate, Direction, EntityId, Owner, UnitState, VoxelKind};

use crate::{CellId, WorldError};

const HEIGHT_MASK: u32 = 0xFFFF;
const COLLAPSE_SHIFT: u32 = 16;

/// Packed height field.
///
/// The low 16 bits hold the height of an expanded record. Collapsing moves
/// the value into the high 16 bits, so the record reports zero extent while
/// it still occupies its cell, and expanding moves it back unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackedHeight(u32);

impl PackedHeight {
    /// Packs an expanded height, saturating at `u16::MAX`.
    #[must_use]
    pub fn expanded(height: i32) -> Self {
        let clamped = height.clamp(0, i32::from(u16::MAX));
        Self(clamped.unsigned_abs())
    }

    /// Height currently contributing to the column; zero while collapsed.
    #[must_use]
    pub const fn height(self) -> i32 {
        (self.0 & HEIGHT_MASK) as i32
    }

    /// Height the record regains once expanded.
    #[must_use]
    pub const fn original_height(self) -> i32 {
        if self.is_collapsed() {
            (self.0 >> COLLAPSE_SHIFT) as i32
        } else {
            self.height()
        }
    }

    /// Reports whether the high half carries the height.
    #[must_use]
    pub const fn is_collapsed(self) -> bool {
        self.0 >> COLLAPSE_SHIFT != 0
    }

    /// Raw packed bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    fn collapse(&mut self) -> bool {
        if self.is_collapsed() || self.height() == 0 {
            return false;
        }
        self.0 <<= COLLAPSE_SHIFT;
        true
    }

    fn expand(&mut self) -> bool {
        if !self.is_collapsed() {
            return false;
        }
        self.0 >>= COLLAPSE_SHIFT;
        true
    }
}

/// Values used to create a new record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordSpec {
    /// Kind of the new record.
    pub kind: VoxelKind,
    /// Owner of the new record.
    pub owner: Owner,
    /// Tree level the record lives on.
    pub weight: i32,
    /// Initial health; must be positive.
    pub health: i32,
    /// Extent of the record inside its column.
    pub height: i32,
    /// Altitude of the record's base.
    pub altitude: i32,
    /// Initial facing.
    pub facing: Direction,
}

/// One stacked occupant of a cell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    id: EntityId,
    kind: VoxelKind,
    owner: Owner,
    weight: i32,
    health: i32,
    facing: Direction,
    altitude: i32,
    packed: PackedHeight,
    state: UnitState,
    pub(crate) cell: Option<CellId>,
    pub(crate) next: Option<EntityId>,
    #[serde(skip)]
    pub(crate) prev: Option<EntityId>,
}

impl EntityRecord {
    pub(crate) fn new(id: EntityId, spec: RecordSpec) -> Self {
        Self {
            id,
            kind: spec.kind,
            owner: spec.owner,
            weight: spec.weight,
            health: spec.health,
            facing: spec.facing,
            altitude: spec.altitude,
            packed: PackedHeight::expanded(spec.height),
            state: UnitState::Idle,
            cell: None,
            next: None,
            prev: None,
        }
    }

    /// Identifier of the record.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Kind of the record.
    #[must_use]
    pub const fn kind(&self) -> VoxelKind {
        self.kind
    }

    /// Owner of the record.
    #[must_use]
    pub const fn owner(&self) -> Owner {
        self.owner
    }

    /// Tree level the record lives on.
    #[must_use]
    pub const fn weight(&self) -> i32 {
        self.weight
    }

    /// Remaining health.
    #[must_use]
    pub const fn health(&self) -> i32 {
        self.health
    }

    /// Reports whether the record still has health.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Direction the record faces.
    #[must_use]
    pub const fn facing(&self) -> Direction {
        self.facing
    }

    /// Altitude of the record's base.
    #[must_use]
    pub const fn altitude(&self) -> i32 {
        self.altitude
    }

    /// Height contributing to the column; zero while collapsed.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.packed.height()
    }

    /// Height the record has when expanded.
    #[must_use]
    pub const fn original_height(&self) -> i32 {
        self.packed.original_height()
    }

    /// Altitude directly above the record.
    #[must_use]
    pub const fn top(&self) -> i32 {
        self.altitude + self.height()
    }

    /// Reports whether the record is crushed.
    #[must_use]
    pub const fn is_collapsed(&self) -> bool {
        self.packed.is_collapsed()
    }

    /// Packed height field.
    #[must_use]
    pub const fn packed_height(&self) -> PackedHeight {
        self.packed
    }

    /// Transient unit state.
    #[must_use]
    pub const fn state(&self) -> UnitState {
        self.state
    }

    /// Cell the record is linked into, if any.
    #[must_use]
    pub const fn cell(&self) -> Option<CellId> {
        self.cell
    }

    /// Next record up the stack of the same cell.
    #[must_use]
    pub const fn next(&self) -> Option<EntityId> {
        self.next
    }

    /// Record directly below in the column, possibly in an ancestor cell.
    #[must_use]
    pub const fn prev(&self) -> Option<EntityId> {
        self.prev
    }

    /// Coordinate of the record given its cell's row and column.
    #[must_use]
    pub const fn coordinate_in(&self, row: i32, col: i32) -> Coordinate {
        Coordinate::new(row, col, self.weight, self.altitude)
    }

    /// Updates the facing.
    pub fn set_facing(&mut self, facing: Direction) {
        self.facing = facing;
    }

    /// Updates the transient unit state.
    pub fn set_state(&mut self, state: UnitState) {
        self.state = state;
    }

    /// Changes health; dead records go through [`crate::VoxelTree::kill`].
    pub fn set_health(&mut self, health: i32) -> Result<(), WorldError> {
        if health <= 0 {
            return Err(WorldError::NonPositiveHealth {
                entity: self.id,
                health,
            });
        }
        self.health = health;
        Ok(())
    }

    /// Crushes or restores the record. Returns whether the flag changed.
    pub fn set_collapsed(&mut self, collapsed: bool) -> bool {
        if collapsed {
            self.packed.collapse()
        } else {
            self.packed.expand()
        }
    }

    /// Sets the height of an expanded record.
    pub fn set_height(&mut self, height: i32) -> Result<(), WorldError> {
        if self.is_collapsed() {
            return Err(WorldError::HeightWhileCollapsed(self.id));
        }
        self.packed = PackedHeight::expanded(height);
        Ok(())
    }

    /// Moves the record vertically. Only callers that re-establish stack order
    /// in the same operation may use it.
    pub fn set_altitude(&mut self, altitude: i32) {
        self.altitude = altitude;
    }

    /// Changes weight and height of a detached record.
    pub fn resize(&mut self, weight: i32, height: i32) -> Result<(), WorldError> {
        if self.cell.is_some() {
            return Err(WorldError::NotDetached(self.id));
        }
        self.set_height(height)?;
        self.weight = weight;
        Ok(())
    }

    pub(crate) fn mark_dead(&mut self) -> i32 {
        let lost = self.health;
        self.health = 0;
        lost
    }
}
