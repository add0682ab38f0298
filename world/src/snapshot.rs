//! Binary snapshots of the whole tree.

use crate::{arena_index, CellId, VoxelTree, WorldError, MAX_TREE_WEIGHT};

impl VoxelTree {
    /// Encodes the tree into canonical snapshot bytes.
    ///
    /// Derived links are not written; [`VoxelTree::from_bytes`] rebuilds them.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WorldError> {
        bincode::serialize(self).map_err(|error| WorldError::Snapshot(error.to_string()))
    }

    /// Decodes snapshot bytes and restores every derived link.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WorldError> {
        let mut tree: Self = bincode::deserialize(bytes)
            .map_err(|error| WorldError::Snapshot(error.to_string()))?;
        if !(0..=MAX_TREE_WEIGHT).contains(&tree.weight) {
            return Err(WorldError::TreeTooDeep(tree.weight));
        }
        let expected: usize = (0..=tree.weight).map(|level| 1_usize << (2 * level)).sum();
        if tree.cells.len() != expected {
            return Err(WorldError::Snapshot(format!(
                "expected {expected} cells for weight {}, found {}",
                tree.weight,
                tree.cells.len()
            )));
        }
        tree.check_layout()?;
        tree.check_stacks()?;
        tree.relink();
        tracing::debug!(
            target: "voxel_battle::world",
            weight = tree.weight,
            records = tree.records().count(),
            "snapshot.restored"
        );
        Ok(tree)
    }

    /// Every cell must sit where a freshly built tree of the same weight
    /// puts it.
    fn check_layout(&self) -> Result<(), WorldError> {
        let layout = Self::new(self.weight)?;
        for (index, (cell, expected)) in self.cells.iter().zip(&layout.cells).enumerate() {
            let placed = (cell.weight, cell.row, cell.col, cell.children);
            if placed != (expected.weight, expected.row, expected.col, expected.children) {
                return Err(corrupt(format!("cell {index} does not match the tree layout")));
            }
        }
        Ok(())
    }

    /// Every stack must be an acyclic chain of live, ascending records of the
    /// cell's level, and every linked record must belong to exactly one chain.
    fn check_stacks(&self) -> Result<(), WorldError> {
        let mut linked = vec![false; self.entities.len()];
        for (index, cell) in self.cells.iter().enumerate() {
            let id = CellId::new(arena_index(index));
            let mut cursor = cell.first;
            let mut tail = None;
            let mut floor = i32::MIN;
            while let Some(entity) = cursor {
                let slot = entity.get() as usize;
                let seen = linked
                    .get_mut(slot)
                    .ok_or_else(|| corrupt(format!("cell {index} links unknown entity {slot}")))?;
                if *seen {
                    return Err(corrupt(format!("entity {slot} is linked more than once")));
                }
                *seen = true;
                let record = self.entities[slot]
                    .as_ref()
                    .ok_or_else(|| corrupt(format!("cell {index} links dead entity {slot}")))?;
                if record.id() != entity || record.cell != Some(id) {
                    return Err(corrupt(format!("entity {slot} disagrees with cell {index}")));
                }
                if record.weight() != cell.weight || record.altitude() < floor {
                    return Err(corrupt(format!("entity {slot} breaks the order of cell {index}")));
                }
                floor = record.altitude();
                tail = cursor;
                cursor = record.next;
            }
            if tail != cell.last {
                return Err(corrupt(format!("cell {index} has a stale tail")));
            }
        }

        for (slot, record) in self.entities.iter().enumerate() {
            let Some(record) = record else {
                continue;
            };
            if record.id().get() as usize != slot {
                return Err(corrupt(format!("slot {slot} holds entity {}", record.id().get())));
            }
            if record.cell.is_some() != linked[slot] {
                return Err(corrupt(format!("entity {slot} is not in its cell's stack")));
            }
            if record.health() <= 0 {
                return Err(corrupt(format!("entity {slot} is alive without health")));
            }
        }
        Ok(())
    }
}

fn corrupt(reason: String) -> WorldError {
    WorldError::Snapshot(reason)
}
