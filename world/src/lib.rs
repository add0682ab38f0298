#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative voxel tree for Voxel Battle.
//!
//! The battlefield is a quaternary tree whose level `w` holds a square grid
//! of `2^(depth - w)` cells per side. Every cell owns an ascending stack of
//! [`EntityRecord`]s; a stack's head links down to the tail of the nearest
//! non-empty ancestor so each fine cell sees one continuous column.

mod cell;
mod column;
mod entity;
mod snapshot;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use voxel_battle_core::{Coordinate, Direction, EntityId};

pub use cell::{Cell, CellId};
pub use column::{is_base_for, is_target_for, TargetQuery, TargetResolution};
pub use entity::{EntityRecord, PackedHeight, RecordSpec};

/// Deepest tree the world supports.
pub const MAX_TREE_WEIGHT: i32 = 12;

/// Structural misuse of the world API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorldError {
    /// The requested tree level does not exist.
    #[error("weight {weight} is outside 0..={max}")]
    InvalidWeight {
        /// Requested level.
        weight: i32,
        /// Deepest level of the tree.
        max: i32,
    },
    /// The tree cannot be built with the requested depth.
    #[error("tree weight {0} is outside 0..={MAX_TREE_WEIGHT}")]
    TreeTooDeep(i32),
    /// The coordinate lies outside the grid of its level.
    #[error("coordinate {0:?} lies outside the tree")]
    OutOfBounds(Coordinate),
    /// No live record carries the identifier.
    #[error("entity {0:?} does not exist")]
    MissingEntity(EntityId),
    /// No cell carries the identifier.
    #[error("cell {0:?} does not exist")]
    MissingCell(CellId),
    /// The record is not linked into any cell.
    #[error("entity {0:?} is not linked into a cell")]
    Detached(EntityId),
    /// The record is still linked into a cell.
    #[error("entity {0:?} is still linked into a cell")]
    NotDetached(EntityId),
    /// Height changes are only valid on expanded records.
    #[error("entity {0:?} is collapsed; its height is frozen")]
    HeightWhileCollapsed(EntityId),
    /// Health updates must stay positive.
    #[error("entity {entity:?} cannot take health {health}")]
    NonPositiveHealth {
        /// Record being updated.
        entity: EntityId,
        /// Rejected value.
        health: i32,
    },
    /// A record was pushed onto a cell of another level.
    #[error("entity {entity:?} has weight {actual} but the cell is on level {expected}")]
    WeightMismatch {
        /// Record being appended.
        entity: EntityId,
        /// Level of the cell.
        expected: i32,
        /// Weight of the record.
        actual: i32,
    },
    /// A record was pushed below the current tail.
    #[error("entity {entity:?} at altitude {altitude} would sit below the tail at {below}")]
    StackOrder {
        /// Record being appended.
        entity: EntityId,
        /// Altitude of the record.
        altitude: i32,
        /// Altitude of the current tail.
        below: i32,
    },
    /// Snapshot bytes could not be produced or decoded.
    #[error("snapshot codec failed: {0}")]
    Snapshot(String),
}

/// Root of the spatial tree: the cell arena and the record arena.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoxelTree {
    weight: i32,
    cells: Vec<Cell>,
    entities: Vec<Option<EntityRecord>>,
}

impl VoxelTree {
    /// Builds every cell of a tree `weight` levels deep.
    pub fn new(weight: i32) -> Result<Self, WorldError> {
        if !(0..=MAX_TREE_WEIGHT).contains(&weight) {
            return Err(WorldError::TreeTooDeep(weight));
        }

        let mut cells = vec![Cell::new(weight, 0, 0, None)];
        let mut cursor = 0;
        while cursor < cells.len() {
            let (level, row, col) = {
                let cell = &cells[cursor];
                (cell.weight, cell.row, cell.col)
            };
            if level > 0 {
                let parent = CellId::new(arena_index(cursor));
                let first = cells.len();
                for quadrant in 0..4 {
                    cells.push(Cell::new(
                        level - 1,
                        row * 2 + quadrant / 2,
                        col * 2 + quadrant % 2,
                        Some(parent),
                    ));
                }
                cells[cursor].children = Some([0, 1, 2, 3].map(|offset| {
                    CellId::new(arena_index(first + offset))
                }));
            }
            cursor += 1;
        }

        let mut tree = Self {
            weight,
            cells,
            entities: Vec::new(),
        };
        tree.rebuild_neighbors();
        tracing::debug!(
            target: "voxel_battle::world",
            weight,
            cells = tree.cells.len(),
            "tree.built"
        );
        Ok(tree)
    }

    /// Depth of the tree; the level of the root cell.
    #[must_use]
    pub const fn weight(&self) -> i32 {
        self.weight
    }

    /// The single cell on the coarsest level.
    #[must_use]
    pub const fn root(&self) -> CellId {
        CellId::new(0)
    }

    /// Number of cells per side on the provided level.
    #[must_use]
    pub fn grid_size(&self, weight: i32) -> Option<i32> {
        (0..=self.weight)
            .contains(&weight)
            .then(|| 1 << (self.weight - weight))
    }

    /// Reports whether the coordinate addresses a cell of this tree.
    #[must_use]
    pub fn contains(&self, coordinate: Coordinate) -> bool {
        self.grid_size(coordinate.weight).is_some_and(|size| {
            (0..size).contains(&coordinate.row) && (0..size).contains(&coordinate.col)
        })
    }

    /// Descends from the root to the cell at `(row, col)` on level `weight`.
    ///
    /// Only the weight is checked; rows and columns outside the grid wrap
    /// onto the quadrant bits they carry, so callers test
    /// [`VoxelTree::contains`] first.
    pub fn resolve(&self, row: i32, col: i32, weight: i32) -> Result<CellId, WorldError> {
        if !(0..=self.weight).contains(&weight) {
            return Err(WorldError::InvalidWeight {
                weight,
                max: self.weight,
            });
        }

        let mut cursor = self.root();
        for level in (weight + 1..=self.weight).rev() {
            let shift = level - 1 - weight;
            let quadrant = ((row >> shift) & 1) * 2 + ((col >> shift) & 1);
            match self.cells[cursor.index()].children {
                Some(children) => cursor = children[quadrant as usize],
                None => break,
            }
        }
        Ok(cursor)
    }

    /// Resolves a coordinate after checking it lies inside the tree.
    pub fn locate(&self, coordinate: Coordinate) -> Result<CellId, WorldError> {
        if !self.contains(coordinate) {
            return Err(WorldError::OutOfBounds(coordinate));
        }
        self.resolve(coordinate.row, coordinate.col, coordinate.weight)
    }

    /// Cell behind an identifier produced by this tree.
    ///
    /// # Panics
    ///
    /// Panics when the identifier does not belong to this tree.
    #[must_use]
    pub fn cell(&self, id: CellId) -> &Cell {
        &self.cells[id.index()]
    }

    /// Cell behind an identifier, reporting unknown identifiers.
    pub fn cell_checked(&self, id: CellId) -> Result<&Cell, WorldError> {
        self.cells.get(id.index()).ok_or(WorldError::MissingCell(id))
    }

    /// Every cell identifier, coarse level first.
    pub fn cell_ids(&self) -> impl Iterator<Item = CellId> + '_ {
        (0..self.cells.len()).map(|index| CellId::new(arena_index(index)))
    }

    /// Cells strictly below `cell`, in level order.
    #[must_use]
    pub fn descendants(&self, cell: CellId) -> Vec<CellId> {
        let mut ordered = Vec::new();
        let mut cursor = 0;
        if let Some(children) = self.cells.get(cell.index()).and_then(Cell::children) {
            ordered.extend_from_slice(&children);
        }
        while cursor < ordered.len() {
            if let Some(children) = self.cells[ordered[cursor].index()].children {
                ordered.extend_from_slice(&children);
            }
            cursor += 1;
        }
        ordered
    }

    /// Ancestors of `cell` from its parent up to the root.
    #[must_use]
    pub fn ancestors(&self, cell: CellId) -> Vec<CellId> {
        let mut chain = Vec::new();
        let mut cursor = self.cells.get(cell.index()).and_then(Cell::parent);
        while let Some(ancestor) = cursor {
            chain.push(ancestor);
            cursor = self.cells[ancestor.index()].parent;
        }
        chain
    }

    /// Live record behind an identifier.
    #[must_use]
    pub fn record(&self, id: EntityId) -> Option<&EntityRecord> {
        self.entities.get(id.get() as usize).and_then(Option::as_ref)
    }

    /// Mutable live record behind an identifier.
    ///
    /// Altitude edits must keep the owning stack ascending.
    pub fn record_mut(&mut self, id: EntityId) -> Option<&mut EntityRecord> {
        self.entities.get_mut(id.get() as usize).and_then(Option::as_mut)
    }

    /// Live record behind an identifier, reporting missing ones.
    pub fn record_checked(&self, id: EntityId) -> Result<&EntityRecord, WorldError> {
        self.record(id).ok_or(WorldError::MissingEntity(id))
    }

    /// Mutable live record behind an identifier, reporting missing ones.
    pub fn record_checked_mut(&mut self, id: EntityId) -> Result<&mut EntityRecord, WorldError> {
        self.record_mut(id).ok_or(WorldError::MissingEntity(id))
    }

    /// Every live record in allocation order.
    pub fn records(&self) -> impl Iterator<Item = &EntityRecord> + '_ {
        self.entities.iter().filter_map(Option::as_ref)
    }

    /// Identifier the next created record receives.
    #[must_use]
    pub fn next_entity_id(&self) -> EntityId {
        EntityId::new(arena_index(self.entities.len()))
    }

    /// Allocates a detached record.
    pub fn allocate(&mut self, spec: RecordSpec) -> Result<EntityId, WorldError> {
        let id = self.next_entity_id();
        if spec.health <= 0 {
            return Err(WorldError::NonPositiveHealth {
                entity: id,
                health: spec.health,
            });
        }
        self.entities.push(Some(EntityRecord::new(id, spec)));
        Ok(id)
    }

    /// Allocates a record and pushes it onto the tail of `cell`.
    pub fn create(&mut self, cell: CellId, spec: RecordSpec) -> Result<EntityId, WorldError> {
        let id = self.allocate(spec)?;
        if let Err(error) = self.append(cell, id) {
            let _ = self.entities.pop();
            return Err(error);
        }
        tracing::trace!(
            target: "voxel_battle::world",
            entity = id.get(),
            kind = ?spec.kind,
            "record.created"
        );
        Ok(id)
    }

    /// Links a detached record into `cell` at the provided altitude.
    pub fn place(&mut self, id: EntityId, cell: CellId, altitude: i32) -> Result<(), WorldError> {
        let record = self.record_checked_mut(id)?;
        if record.cell.is_some() {
            return Err(WorldError::NotDetached(id));
        }
        let previous = record.altitude();
        record.set_altitude(altitude);
        if let Err(error) = self.append(cell, id) {
            if let Some(record) = self.record_mut(id) {
                record.set_altitude(previous);
            }
            return Err(error);
        }
        Ok(())
    }

    /// Coordinate of a linked record.
    #[must_use]
    pub fn coordinate_of(&self, id: EntityId) -> Option<Coordinate> {
        let record = self.record(id)?;
        let cell = self.cells.get(record.cell()?.index())?;
        Some(record.coordinate_in(cell.row, cell.col))
    }

    /// Record directly below in the continuous column.
    #[must_use]
    pub fn below(&self, id: EntityId) -> Option<EntityId> {
        self.record(id).and_then(EntityRecord::prev)
    }

    /// Reports whether a non-collapsed record rests at or above `id` in its
    /// column.
    #[must_use]
    pub fn is_covered(&self, id: EntityId) -> bool {
        let Some((cell, altitude)) = self.placement(id) else {
            return false;
        };
        self.is_buried(id)
            || self
                .descendants(cell)
                .into_iter()
                .any(|other| self.has_standing_at_or_above(other, altitude, id))
    }

    /// Like [`VoxelTree::is_covered`], but only looks at the record's own
    /// stack and the stacks of its ancestors.
    #[must_use]
    pub fn is_buried(&self, id: EntityId) -> bool {
        let Some(record) = self.record(id) else {
            return false;
        };
        let Some((cell, altitude)) = self.placement(id) else {
            return false;
        };

        let mut cursor = record.next();
        while let Some(next) = cursor {
            let Some(other) = self.record(next) else {
                break;
            };
            if !other.is_collapsed() {
                return true;
            }
            cursor = other.next();
        }

        self.ancestors(cell)
            .into_iter()
            .any(|other| self.has_standing_at_or_above(other, altitude, id))
    }

    fn placement(&self, id: EntityId) -> Option<(CellId, i32)> {
        let record = self.record(id)?;
        Some((record.cell()?, record.altitude()))
    }

    fn has_standing_at_or_above(&self, cell: CellId, altitude: i32, except: EntityId) -> bool {
        self.stack(cell)
            .into_iter()
            .filter_map(|other| self.record(other))
            .any(|other| {
                other.id() != except && !other.is_collapsed() && other.altitude() >= altitude
            })
    }

    /// Records of `cell` and its descendants whose altitude is at least
    /// `altitude`; local stack first, then descendants in level order.
    #[must_use]
    pub fn records_at_or_above(
        &self,
        cell: CellId,
        altitude: i32,
        exclude: Option<EntityId>,
    ) -> Vec<EntityId> {
        std::iter::once(cell)
            .chain(self.descendants(cell))
            .flat_map(|candidate| self.stack(candidate))
            .filter(|id| Some(*id) != exclude)
            .filter(|id| {
                self.record(*id)
                    .is_some_and(|record| record.altitude() >= altitude)
            })
            .collect()
    }

    /// Reports whether `cell` or any descendant holds a record.
    #[must_use]
    pub fn subtree_has_records(&self, cell: CellId) -> bool {
        std::iter::once(cell)
            .chain(self.descendants(cell))
            .any(|candidate| !self.cells[candidate.index()].is_empty())
    }

    /// Recomputes every cached axis-neighbour link.
    pub fn rebuild_neighbors(&mut self) {
        for index in 0..self.cells.len() {
            let origin = self.cells[index].coordinate(0);
            let mut neighbors = [None; 4];
            for direction in Direction::ALL {
                let next = origin.step(direction);
                if self.contains(next) {
                    neighbors[direction.index()] =
                        self.resolve(next.row, next.col, next.weight).ok();
                }
            }
            self.cells[index].neighbors = neighbors;
        }
    }

    /// Restores every derived link: parents, neighbours and `prev` chains.
    pub fn relink(&mut self) {
        for index in 0..self.cells.len() {
            if let Some(children) = self.cells[index].children {
                let parent = CellId::new(arena_index(index));
                for child in children {
                    if let Some(cell) = self.cells.get_mut(child.index()) {
                        cell.parent = Some(parent);
                    }
                }
            }
        }
        self.rebuild_neighbors();

        for index in 0..self.cells.len() {
            let cell = CellId::new(arena_index(index));
            let mut below = self.ancestor_tail(cell);
            for id in self.stack(cell) {
                if let Some(record) = self.record_mut(id) {
                    record.prev = below;
                }
                below = Some(id);
            }
        }
    }
}

fn arena_index(index: usize) -> u32 {
    u32::try_from(index).unwrap_or(u32::MAX)
}

/// Query functions that provide read-only access to the tree.
pub mod query {
    use sha2::{Digest, Sha256};
    use voxel_battle_core::{Coordinate, EntityId, Owner, VoxelKind};

    use super::{EntityRecord, VoxelTree, WorldError};

    /// Coordinates of live records matching the filters.
    ///
    /// Ordered coarse level first, row-major within a level and bottom-up
    /// within a stack.
    #[must_use]
    pub fn records_of(
        tree: &VoxelTree,
        kind: VoxelKind,
        owner: Option<Owner>,
        weight: Option<i32>,
    ) -> Vec<Coordinate> {
        let mut cells: Vec<_> = tree
            .cell_ids()
            .filter(|cell| weight.map_or(true, |weight| tree.cell(*cell).weight() == weight))
            .collect();
        cells.sort_by_key(|cell| {
            let cell = tree.cell(*cell);
            (std::cmp::Reverse(cell.weight()), cell.row(), cell.col())
        });

        let mut found = Vec::new();
        for cell in cells {
            let node = tree.cell(cell);
            for id in tree.stack(cell) {
                let Some(record) = tree.record(id) else {
                    continue;
                };
                let owned = owner.map_or(true, |owner| record.owner() == owner);
                if record.kind() == kind && owned && record.is_alive() {
                    found.push(record.coordinate_in(node.row(), node.col()));
                }
            }
        }
        found
    }

    /// Records stacked in the cell addressed by `coordinate`, bottom to top.
    pub fn stack(tree: &VoxelTree, coordinate: Coordinate) -> Result<Vec<&EntityRecord>, WorldError> {
        let cell = tree.locate(coordinate)?;
        Ok(tree
            .stack(cell)
            .into_iter()
            .filter_map(|id| tree.record(id))
            .collect())
    }

    /// Coordinate of a linked record.
    #[must_use]
    pub fn coordinate_of(tree: &VoxelTree, id: EntityId) -> Option<Coordinate> {
        tree.coordinate_of(id)
    }

    /// Number of live records.
    #[must_use]
    pub fn live_count(tree: &VoxelTree) -> usize {
        tree.records().count()
    }

    /// SHA-256 digest of the canonical snapshot bytes.
    pub fn fingerprint(tree: &VoxelTree) -> Result<[u8; 32], WorldError> {
        let bytes = tree.to_bytes()?;
        Ok(Sha256::digest(&bytes).into())
    }
}
