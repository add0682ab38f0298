//! Default landing resolution inside a column.

use voxel_battle_core::{EntityId, Owner, VoxelKind};

use crate::{entity::EntityRecord, CellId, VoxelTree};

/// Describes the record that wants to land in a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetQuery<'a> {
    /// Kind of the arriving record.
    pub kind: VoxelKind,
    /// Weight of the arriving record.
    pub weight: i32,
    /// Owner of the arriving record.
    pub owner: Owner,
    /// Allows the surface to be the chosen target itself.
    pub lowest_possible: bool,
    /// Owners whose records never become the target.
    pub except_owners: &'a [Owner],
    /// Record skipped by the scan, usually the arriving record itself.
    pub ignore: Option<EntityId>,
}

impl<'a> TargetQuery<'a> {
    /// Query for a record of the provided kind, weight and owner.
    #[must_use]
    pub const fn new(kind: VoxelKind, weight: i32, owner: Owner) -> Self {
        Self {
            kind,
            weight,
            owner,
            lowest_possible: false,
            except_owners: &[],
            ignore: None,
        }
    }

    /// Sets the `lowest_possible` tie-break.
    #[must_use]
    pub const fn lowest_possible(mut self, lowest_possible: bool) -> Self {
        self.lowest_possible = lowest_possible;
        self
    }

    /// Excludes records of the provided owners from becoming the target.
    #[must_use]
    pub const fn except(mut self, owners: &'a [Owner]) -> Self {
        self.except_owners = owners;
        self
    }

    /// Skips one record during the scan.
    #[must_use]
    pub const fn ignoring(mut self, entity: EntityId) -> Self {
        self.ignore = Some(entity);
        self
    }
}

/// Result of a column scan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TargetResolution {
    /// Record the arriving one would rest on.
    pub surface: Option<EntityId>,
    /// Highest engageable record in the column.
    pub target: Option<EntityId>,
}

/// Reports whether `record` can carry a record of `kind` and `weight`.
#[must_use]
pub fn is_base_for(record: &EntityRecord, kind: VoxelKind, weight: i32) -> bool {
    record.is_alive()
        && !record.is_collapsed()
        && record.kind().can_support()
        && record.weight() >= weight
        && (kind != VoxelKind::Ground || record.kind().is_terrain())
}

/// Reports whether `record` can be engaged by the querying record.
#[must_use]
pub fn is_target_for(record: &EntityRecord, query: &TargetQuery<'_>) -> bool {
    record.is_alive()
        && query.ignore != Some(record.id())
        && !query.except_owners.contains(&record.owner())
        && (record.kind().is_unit() || record.kind() == VoxelKind::Eatable)
}

impl VoxelTree {
    /// Scans the column of `cell` top-down, local stack first and then each
    /// ancestor's stack.
    ///
    /// The ignored record is passed over entirely. The first engageable
    /// record becomes the target. The first supporting
    /// record becomes the surface and ends the scan, unless it is the target
    /// and `lowest_possible` is unset; the scan then continues below it.
    #[must_use]
    pub fn default_target_for(&self, cell: CellId, query: &TargetQuery<'_>) -> TargetResolution {
        let mut resolution = TargetResolution::default();
        let column = std::iter::once(cell).chain(self.ancestors(cell));
        for level in column {
            for id in self.stack(level).into_iter().rev() {
                if query.ignore == Some(id) {
                    continue;
                }
                let Some(record) = self.record(id) else {
                    continue;
                };
                if resolution.target.is_none() && is_target_for(record, query) {
                    resolution.target = Some(id);
                }
                if is_base_for(record, query.kind, query.weight) {
                    if resolution.target == Some(id) && !query.lowest_possible {
                        continue;
                    }
                    resolution.surface = Some(id);
                    return resolution;
                }
            }
        }
        resolution
    }
}
