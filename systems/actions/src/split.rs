//! Splitting a unit into two side-by-side clones or four quadrant clones.

use voxel_battle_core::{Direction, Effect, EntityId, ResultCode};
use voxel_battle_world::{is_base_for, CellId, TargetQuery, VoxelTree, WorldError};

use crate::{
    resolution::{classify, resolve_arrival, Interaction},
    Mover,
};

pub(crate) struct SplitPlan<'a> {
    mover: Mover<'a>,
    neighbor: CellId,
    direction: Direction,
}

pub(crate) fn validate_split<'a>(
    mover: &Mover<'a>,
    tree: &VoxelTree,
) -> Result<SplitPlan<'a>, ResultCode> {
    if !mover.abilities.can_split {
        return Err(ResultCode::NOT_SUPPORTED);
    }
    mover.ensure_free(tree)?;
    if mover.health < mover.abilities.max_health {
        return Err(ResultCode::NEED_MORE_RESOURCES);
    }

    let cell = tree.cell(mover.cell);
    let query = TargetQuery::new(mover.kind, mover.weight, mover.owner).ignoring(mover.id);
    for direction in mover.facing.clockwise_from() {
        let Some(neighbor) = cell.neighbor(direction) else {
            continue;
        };
        let resolution = tree.default_target_for(neighbor, &query);
        let level = resolution
            .surface
            .and_then(|surface| tree.record(surface))
            .is_some_and(|surface| surface.top() == mover.altitude);
        let collapsible = resolution
            .target
            .and_then(|target| tree.record(target))
            .map_or(true, |target| {
                classify(mover.owner, mover.weight, mover.abilities, target)
                    == Some(Interaction::Collapse)
            });
        if level && collapsible {
            return Ok(SplitPlan {
                mover: *mover,
                neighbor,
                direction,
            });
        }
    }
    Err(ResultCode::NOT_FOUND)
}

pub(crate) fn commit_split(
    tree: &mut VoxelTree,
    plan: SplitPlan<'_>,
    out: &mut Vec<Effect>,
) -> Result<EntityId, WorldError> {
    let SplitPlan {
        mover,
        neighbor,
        direction,
    } = plan;

    let stay = tree.replace(mover.id, mover.clone_spec(mover.altitude))?;
    out.push(Effect::Die { entity: mover.id });
    push_create(tree, stay, out);

    let mut spec = mover.clone_spec(mover.altitude);
    spec.facing = direction;
    let sibling = tree.allocate(spec)?;
    resolve_arrival(tree, mover.table, sibling, neighbor, mover.altitude, out)?;
    tree.place(sibling, neighbor, mover.altitude)?;
    push_create(tree, sibling, out);
    Ok(stay)
}

pub(crate) struct Split4Plan<'a> {
    mover: Mover<'a>,
    landings: [(CellId, i32); 4],
}

pub(crate) fn validate_split4<'a>(
    mover: &Mover<'a>,
    tree: &VoxelTree,
) -> Result<Split4Plan<'a>, ResultCode> {
    if !mover.abilities.can_split4 {
        return Err(ResultCode::NOT_SUPPORTED);
    }
    let children = tree.cell(mover.cell).children();
    let Some(children) = children.filter(|_| mover.weight > mover.abilities.min_weight) else {
        return Err(ResultCode::MIN_WEIGHT);
    };
    mover.ensure_free(tree)?;

    let child_weight = mover.weight - 1;
    let supported = tree
        .below(mover.id)
        .and_then(|below| tree.record(below))
        .is_some_and(|below| is_base_for(below, mover.kind, child_weight));
    if !supported {
        return Err(ResultCode::INVALID_LOCATION);
    }

    let query = TargetQuery::new(mover.kind, child_weight, mover.owner)
        .lowest_possible(true)
        .ignoring(mover.id);
    let mut landings = [(children[0], 0); 4];
    for (slot, child) in landings.iter_mut().zip(children) {
        let top = tree
            .default_target_for(child, &query)
            .surface
            .and_then(|surface| tree.record(surface))
            .map(|surface| surface.top())
            .ok_or(ResultCode::INVALID_LOCATION)?;
        *slot = (child, top);
    }
    Ok(Split4Plan {
        mover: *mover,
        landings,
    })
}

pub(crate) fn commit_split4(
    tree: &mut VoxelTree,
    plan: Split4Plan<'_>,
    out: &mut Vec<Effect>,
) -> Result<EntityId, WorldError> {
    let Split4Plan { mover, landings } = plan;
    let height = (mover.height / 2).max(1);

    let _ = tree.kill(mover.id, false)?;
    out.push(Effect::Die { entity: mover.id });

    let mut first = None;
    for (child, altitude) in landings {
        let spec = mover.offspring(mover.weight - 1, height, altitude);
        let clone = tree.create(child, spec)?;
        push_create(tree, clone, out);
        let _ = first.get_or_insert(clone);
    }
    first.ok_or(WorldError::MissingEntity(mover.id))
}

fn push_create(tree: &VoxelTree, entity: EntityId, out: &mut Vec<Effect>) {
    if let Some(at) = tree.coordinate_of(entity) {
        out.push(Effect::Create { entity, at });
    }
}
