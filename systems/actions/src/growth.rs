//! Moving a unit one level up or down the tree.

use voxel_battle_core::{Effect, ResultCode};
use voxel_battle_world::{CellId, TargetQuery, VoxelTree, WorldError};

use crate::{
    resolution::{check_reach, classify, expand_uncovered, resolve_arrival, Interaction},
    with_fallback, Mover,
};

pub(crate) struct ResizePlan<'a> {
    mover: Mover<'a>,
    cell: CellId,
    weight: i32,
    height: i32,
    altitude: i32,
}

pub(crate) fn validate_grow<'a>(
    mover: &Mover<'a>,
    tree: &VoxelTree,
) -> Result<ResizePlan<'a>, ResultCode> {
    if !mover.abilities.can_grow {
        return Err(ResultCode::NOT_SUPPORTED);
    }
    let parent = tree.cell(mover.cell).parent();
    let Some(parent) = parent.filter(|_| mover.weight < mover.abilities.max_weight) else {
        return Err(ResultCode::MAX_WEIGHT);
    };
    mover.ensure_free(tree)?;
    if mover.health < mover.abilities.max_health {
        return Err(ResultCode::NEED_MORE_RESOURCES);
    }

    let weight = mover.weight + 1;
    let height = mover.height.saturating_mul(2);
    let land = |lowest_possible: bool| -> Result<i32, ResultCode> {
        let query = TargetQuery::new(mover.kind, weight, mover.owner)
            .lowest_possible(lowest_possible)
            .ignoring(mover.id);
        let altitude = landing(mover, tree, parent, &query, weight)?;
        check_reach(mover.abilities, height, mover.altitude, altitude)?;
        Ok(altitude)
    };
    let altitude = with_fallback(land(false), || land(true))?;

    Ok(ResizePlan {
        mover: *mover,
        cell: parent,
        weight,
        height,
        altitude,
    })
}

pub(crate) fn validate_diminish<'a>(
    mover: &Mover<'a>,
    tree: &VoxelTree,
) -> Result<ResizePlan<'a>, ResultCode> {
    if !mover.abilities.can_diminish {
        return Err(ResultCode::NOT_SUPPORTED);
    }
    let children = tree.cell(mover.cell).children();
    let Some(children) = children.filter(|_| mover.weight > mover.abilities.min_weight) else {
        return Err(ResultCode::MIN_WEIGHT);
    };
    mover.ensure_free(tree)?;

    let weight = mover.weight - 1;
    let query = TargetQuery::new(mover.kind, weight, mover.owner).ignoring(mover.id);
    let altitude = landing(mover, tree, children[0], &query, weight)?;

    Ok(ResizePlan {
        mover: *mover,
        cell: children[0],
        weight,
        height: (mover.height / 2).max(1),
        altitude,
    })
}

/// Surface top in `cell`, provided any target there can be engaged at the
/// new weight.
fn landing(
    mover: &Mover<'_>,
    tree: &VoxelTree,
    cell: CellId,
    query: &TargetQuery<'_>,
    weight: i32,
) -> Result<i32, ResultCode> {
    let resolution = tree.default_target_for(cell, query);
    let top = resolution
        .surface
        .and_then(|surface| tree.record(surface))
        .map(|surface| surface.top())
        .ok_or(ResultCode::INVALID_LOCATION)?;
    if let Some(target) = resolution.target.and_then(|target| tree.record(target)) {
        match classify(mover.owner, weight, mover.abilities, target) {
            None | Some(Interaction::Detonate) => {
                return Err(ResultCode::INVALID_TARGET_LOCATION);
            }
            Some(_) => {}
        }
    }
    Ok(top)
}

pub(crate) fn commit(
    tree: &mut VoxelTree,
    plan: ResizePlan<'_>,
    out: &mut Vec<Effect>,
) -> Result<(), WorldError> {
    let ResizePlan {
        mover,
        cell,
        weight,
        height,
        altitude,
    } = plan;

    tree.remove(mover.id)?;
    tree.record_checked_mut(mover.id)?.resize(weight, height)?;
    resolve_arrival(tree, mover.table, mover.id, cell, altitude, out)?;
    tree.place(mover.id, cell, altitude)?;
    expand_uncovered(tree, mover.cell, mover.altitude, out)
}
