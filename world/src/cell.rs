//! Cell nodes of the quaternary tree and the stack mutations they own.

use serde::{Deserialize, Serialize};
use voxel_battle_core::{Coordinate, Direction, EntityId};

use crate::{entity::EntityRecord, RecordSpec, VoxelTree, WorldError};

/// Index of a cell inside the tree arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId(u32);

impl CellId {
    /// Creates a cell identifier from its arena index.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Arena index of the cell.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// One node of the spatial tree at one resolution level.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub(crate) weight: i32,
    pub(crate) row: i32,
    pub(crate) col: i32,
    #[serde(skip)]
    pub(crate) parent: Option<CellId>,
    pub(crate) children: Option<[CellId; 4]>,
    #[serde(skip)]
    pub(crate) neighbors: [Option<CellId>; 4],
    pub(crate) first: Option<EntityId>,
    pub(crate) last: Option<EntityId>,
}

impl Cell {
    pub(crate) fn new(weight: i32, row: i32, col: i32, parent: Option<CellId>) -> Self {
        Self {
            weight,
            row,
            col,
            parent,
            children: None,
            neighbors: [None; 4],
            first: None,
            last: None,
        }
    }

    /// Tree level of the cell.
    #[must_use]
    pub const fn weight(&self) -> i32 {
        self.weight
    }

    /// Row index at the cell's level.
    #[must_use]
    pub const fn row(&self) -> i32 {
        self.row
    }

    /// Column index at the cell's level.
    #[must_use]
    pub const fn col(&self) -> i32 {
        self.col
    }

    /// Coordinate of the cell at the provided altitude.
    #[must_use]
    pub const fn coordinate(&self, altitude: i32) -> Coordinate {
        Coordinate::new(self.row, self.col, self.weight, altitude)
    }

    /// Enclosing cell one level up.
    #[must_use]
    pub const fn parent(&self) -> Option<CellId> {
        self.parent
    }

    /// Child quadrants indexed by `2 * row_bit + col_bit`.
    #[must_use]
    pub const fn children(&self) -> Option<[CellId; 4]> {
        self.children
    }

    /// Cached axis neighbour at the same level.
    #[must_use]
    pub const fn neighbor(&self, direction: Direction) -> Option<CellId> {
        self.neighbors[direction.index()]
    }

    /// Cached axis neighbours in [`Direction::ALL`] order.
    #[must_use]
    pub const fn neighbors(&self) -> [Option<CellId>; 4] {
        self.neighbors
    }

    /// Lowest record of the local stack.
    #[must_use]
    pub const fn first(&self) -> Option<EntityId> {
        self.first
    }

    /// Highest record of the local stack.
    #[must_use]
    pub const fn last(&self) -> Option<EntityId> {
        self.last
    }

    /// Reports whether the local stack is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.first.is_none()
    }
}

impl VoxelTree {
    /// Pushes a detached record onto the tail of a cell's stack.
    ///
    /// The record must live on the cell's level and must not sit below the
    /// current tail.
    pub fn append(&mut self, cell: CellId, entity: EntityId) -> Result<(), WorldError> {
        let (weight, tail) = {
            let target = self.cell_checked(cell)?;
            (target.weight, target.last)
        };
        let record = self.record_checked(entity)?;
        if record.cell.is_some() {
            return Err(WorldError::NotDetached(entity));
        }
        if record.weight() != weight {
            return Err(WorldError::WeightMismatch {
                entity,
                expected: weight,
                actual: record.weight(),
            });
        }
        if let Some(tail) = tail {
            let tail_altitude = self.record_checked(tail)?.altitude();
            if record.altitude() < tail_altitude {
                return Err(WorldError::StackOrder {
                    entity,
                    altitude: record.altitude(),
                    below: tail_altitude,
                });
            }
        }

        let prev = match tail {
            Some(tail) => Some(tail),
            None => self.ancestor_tail(cell),
        };
        {
            let record = self.record_checked_mut(entity)?;
            record.cell = Some(cell);
            record.next = None;
            record.prev = prev;
        }
        if let Some(tail) = tail {
            self.record_checked_mut(tail)?.next = Some(entity);
        }
        let target = &mut self.cells[cell.index()];
        if target.first.is_none() {
            target.first = Some(entity);
        }
        target.last = Some(entity);
        self.relink_heads_below(cell);
        Ok(())
    }

    /// Unlinks a record without touching any altitude.
    ///
    /// The record stays allocated and detached until it is appended again or
    /// killed.
    pub fn remove(&mut self, entity: EntityId) -> Result<(), WorldError> {
        let record = self.record_checked(entity)?;
        let Some(cell) = record.cell else {
            return Err(WorldError::Detached(entity));
        };
        let next = record.next;
        let local_prev = record
            .prev
            .filter(|prev| self.record(*prev).and_then(EntityRecord::cell) == Some(cell));

        match local_prev {
            Some(prev) => self.record_checked_mut(prev)?.next = next,
            None => self.cells[cell.index()].first = next,
        }
        match next {
            Some(next) => {
                let below = match local_prev {
                    Some(prev) => Some(prev),
                    None => self.ancestor_tail(cell),
                };
                self.record_checked_mut(next)?.prev = below;
            }
            None => self.cells[cell.index()].last = local_prev,
        }

        {
            let record = self.record_checked_mut(entity)?;
            record.cell = None;
            record.next = None;
            record.prev = None;
        }
        self.relink_heads_below(cell);
        Ok(())
    }

    /// Unlinks a record and lets everything above it fall by its height.
    ///
    /// Every later record of the local stack is lowered, as is every record of
    /// a descendant stack resting at or above the removed record's top.
    pub fn remove_and_lower(&mut self, entity: EntityId) -> Result<Vec<EntityId>, WorldError> {
        let record = self.record_checked(entity)?;
        let Some(cell) = record.cell else {
            return Err(WorldError::Detached(entity));
        };
        let drop = record.height();
        let top = record.top();
        let mut above = Vec::new();
        let mut cursor = record.next;
        while let Some(id) = cursor {
            above.push(id);
            cursor = self.record_checked(id)?.next;
        }
        for descendant in self.descendants(cell) {
            for id in self.stack(descendant) {
                if self.record_checked(id)?.altitude() >= top {
                    above.push(id);
                }
            }
        }

        self.remove(entity)?;
        if drop > 0 {
            for id in &above {
                let record = self.record_checked_mut(*id)?;
                let lowered = record.altitude() - drop;
                record.set_altitude(lowered);
            }
        }
        tracing::trace!(
            target: "voxel_battle::world",
            entity = entity.get(),
            drop,
            lowered = above.len(),
            "stack.remove_and_lower"
        );
        Ok(above)
    }

    /// Zeroes a record's health, unlinks it and frees its slot.
    ///
    /// Returns the health it held. With `lower` set the records above fall as
    /// in [`VoxelTree::remove_and_lower`].
    pub fn kill(&mut self, entity: EntityId, lower: bool) -> Result<i32, WorldError> {
        let linked = self.record_checked(entity)?.cell.is_some();
        if linked {
            if lower {
                let _ = self.remove_and_lower(entity)?;
            } else {
                self.remove(entity)?;
            }
        }
        let lost = self.record_checked_mut(entity)?.mark_dead();
        self.entities[entity.get() as usize] = None;
        Ok(lost)
    }

    /// Swaps a linked record for a new one holding the same stack position.
    ///
    /// The new record takes the old one's altitude and links; the old one
    /// dies without lowering anything.
    pub fn replace(&mut self, old: EntityId, spec: RecordSpec) -> Result<EntityId, WorldError> {
        let record = self.record_checked(old)?;
        let Some(cell) = record.cell else {
            return Err(WorldError::Detached(old));
        };
        let (prev, next, altitude) = (record.prev, record.next, record.altitude());
        let expected = self.cell_checked(cell)?.weight;
        if spec.weight != expected {
            return Err(WorldError::WeightMismatch {
                entity: old,
                expected,
                actual: spec.weight,
            });
        }
        let local_prev =
            prev.filter(|prev| self.record(*prev).and_then(EntityRecord::cell) == Some(cell));

        let id = self.allocate(RecordSpec { altitude, ..spec })?;
        {
            let record = self.record_checked_mut(id)?;
            record.cell = Some(cell);
            record.prev = prev;
            record.next = next;
        }
        match local_prev {
            Some(prev) => self.record_checked_mut(prev)?.next = Some(id),
            None => self.cells[cell.index()].first = Some(id),
        }
        match next {
            Some(next) => self.record_checked_mut(next)?.prev = Some(id),
            None => self.cells[cell.index()].last = Some(id),
        }
        {
            let record = self.record_checked_mut(old)?;
            record.cell = None;
            record.next = None;
            record.prev = None;
        }
        let _ = self.kill(old, false)?;
        self.relink_heads_below(cell);
        Ok(id)
    }

    /// Records of a cell's local stack, bottom to top.
    #[must_use]
    pub fn stack(&self, cell: CellId) -> Vec<EntityId> {
        let mut ids = Vec::new();
        let mut cursor = self.cells.get(cell.index()).and_then(Cell::first);
        while let Some(id) = cursor {
            ids.push(id);
            cursor = self.record(id).and_then(EntityRecord::next);
        }
        ids
    }

    pub(crate) fn ancestor_tail(&self, cell: CellId) -> Option<EntityId> {
        let mut cursor = self.cells[cell.index()].parent;
        while let Some(ancestor) = cursor {
            let node = &self.cells[ancestor.index()];
            if node.last.is_some() {
                return node.last;
            }
            cursor = node.parent;
        }
        None
    }

    /// Re-anchors the heads of descendant stacks whose nearest non-empty
    /// ancestor is `cell` or one of its ancestors.
    pub(crate) fn relink_heads_below(&mut self, cell: CellId) {
        let anchor = match self.cells[cell.index()].last {
            Some(last) => Some(last),
            None => self.ancestor_tail(cell),
        };
        let Some(children) = self.cells[cell.index()].children else {
            return;
        };
        let mut pending: Vec<CellId> = children.to_vec();
        while let Some(child) = pending.pop() {
            let node = &self.cells[child.index()];
            match node.first {
                Some(head) => {
                    if let Some(Some(record)) = self.entities.get_mut(head.get() as usize) {
                        record.prev = anchor;
                    }
                }
                None => {
                    if let Some(grandchildren) = node.children {
                        pending.extend_from_slice(&grandchildren);
                    }
                }
            }
        }
    }
}
