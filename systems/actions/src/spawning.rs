//! Spawners emitting fresh units into a free quadrant.

use voxel_battle_core::{default_height, Effect, ResultCode};
use voxel_battle_world::{CellId, RecordSpec, TargetQuery, VoxelTree, WorldError};

use crate::Mover;

pub(crate) struct SpawnPlan<'a> {
    mover: Mover<'a>,
    cell: CellId,
    spec: RecordSpec,
}

pub(crate) fn validate<'a>(
    mover: &Mover<'a>,
    tree: &VoxelTree,
) -> Result<SpawnPlan<'a>, ResultCode> {
    let Some(kind) = mover.abilities.spawn_kind else {
        return Err(ResultCode::NOT_SUPPORTED);
    };
    let weight = mover.weight - 2;
    let spawned = mover.table.lookup(mover.owner, kind);
    if weight < spawned.min_weight.max(0) {
        return Err(ResultCode::MIN_WEIGHT);
    }
    if mover.collapsed || tree.is_buried(mover.id) {
        return Err(ResultCode::COLLAPSED_OR_BLOCKED);
    }
    if mover.health <= mover.abilities.spawn_health_cost {
        return Err(ResultCode::NEED_MORE_RESOURCES);
    }

    let query = TargetQuery::new(kind, weight, mover.owner).lowest_possible(true);
    let Some(children) = tree.cell(mover.cell).children() else {
        return Err(ResultCode::NOT_FOUND);
    };
    for child in children {
        let node = tree.cell(child);
        if !node.is_empty() {
            continue;
        }
        let Some(grandchildren) = node.children() else {
            continue;
        };
        if tree.subtree_has_records(grandchildren[0]) || tree.subtree_has_records(grandchildren[3])
        {
            continue;
        }
        let Some(top) = tree
            .default_target_for(grandchildren[0], &query)
            .surface
            .and_then(|surface| tree.record(surface))
            .map(|surface| surface.top())
        else {
            continue;
        };
        return Ok(SpawnPlan {
            mover: *mover,
            cell: grandchildren[0],
            spec: RecordSpec {
                kind,
                owner: mover.owner,
                weight,
                health: spawned.default_health.max(1),
                height: default_height(weight),
                altitude: top,
                facing: mover.facing,
            },
        });
    }
    Err(ResultCode::NOT_FOUND)
}

pub(crate) fn commit(
    tree: &mut VoxelTree,
    plan: SpawnPlan<'_>,
    out: &mut Vec<Effect>,
) -> Result<(), WorldError> {
    let SpawnPlan { mover, cell, spec } = plan;
    let spawned = tree.create(cell, spec)?;
    if let Some(at) = tree.coordinate_of(spawned) {
        out.push(Effect::Create {
            entity: spawned,
            at,
        });
    }
    let cost = mover.abilities.spawn_health_cost;
    if cost > 0 {
        tree.record_checked_mut(mover.id)?
            .set_health(mover.health - cost)?;
    }
    Ok(())
}
