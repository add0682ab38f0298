//! Single-step moves into an adjacent cell.

use voxel_battle_core::{Coordinate, Direction, Effect, EntityId, ResultCode, UnitState};
use voxel_battle_world::{CellId, TargetQuery, TargetResolution, VoxelTree, WorldError};

use crate::{
    cell_at,
    resolution::{
        check_reach, classify, expand_uncovered, resolve_arrival, resolve_detonation, Interaction,
    },
    with_fallback, Mover,
};

pub(crate) struct MovePlan<'a> {
    mover: Mover<'a>,
    cell: CellId,
    to: Coordinate,
    direction: Direction,
    landing: Landing,
    pub(crate) target: Option<EntityId>,
}

impl MovePlan<'_> {
    pub(crate) fn destination(&self) -> Coordinate {
        self.to.with_altitude(self.landing.altitude)
    }
}

#[derive(Clone, Copy)]
struct Landing {
    altitude: i32,
    detonate: bool,
}

pub(crate) fn validate<'a>(
    mover: &Mover<'a>,
    tree: &VoxelTree,
    to: Coordinate,
    is_last_step: bool,
) -> Result<MovePlan<'a>, ResultCode> {
    if !mover.abilities.can_move {
        return Err(ResultCode::NOT_SUPPORTED);
    }
    if to.weight != mover.weight || !tree.contains(to) {
        return Err(ResultCode::INVALID_ARGUMENTS);
    }
    let direction = mover
        .coordinate
        .direction_to(to)
        .ok_or(ResultCode::INVALID_ARGUMENTS)?;
    mover.ensure_free(tree)?;
    let cell = cell_at(tree, to)?;

    if is_last_step && has_busy_friend(mover, tree, cell) {
        return Err(ResultCode::UNABLE_TO_MOVE);
    }

    let query = TargetQuery::new(mover.kind, mover.weight, mover.owner).ignoring(mover.id);
    let resolution = tree.default_target_for(cell, &query);
    let landing = with_fallback(direct(mover, tree, &resolution, to.altitude), || {
        fallback(mover, tree, &resolution)
    })?;

    Ok(MovePlan {
        mover: *mover,
        cell,
        to,
        direction,
        landing,
        target: resolution.target,
    })
}

/// Looks through the destination stack and every finer stack under it.
fn has_busy_friend(mover: &Mover<'_>, tree: &VoxelTree, cell: CellId) -> bool {
    std::iter::once(cell)
        .chain(tree.descendants(cell))
        .flat_map(|column| tree.stack(column))
        .filter_map(|id| tree.record(id))
        .any(|record| {
            record.is_alive()
                && record.owner() == mover.owner
                && record.kind().is_unit()
                && record.state() != UnitState::Idle
        })
}

/// Steps onto a surface exactly at the expected altitude with nothing to
/// engage.
fn direct(
    mover: &Mover<'_>,
    tree: &VoxelTree,
    resolution: &TargetResolution,
    expected: i32,
) -> Result<Landing, ResultCode> {
    let top = resolution
        .surface
        .and_then(|surface| tree.record(surface))
        .map(|surface| surface.top())
        .ok_or(ResultCode::INVALID_LOCATION)?;
    if top != expected {
        return Err(ResultCode::INVALID_LOCATION);
    }
    if resolution.target.is_some() {
        return Err(ResultCode::INVALID_TARGET_LOCATION);
    }
    check_reach(mover.abilities, mover.height, mover.altitude, top)?;
    Ok(Landing {
        altitude: top,
        detonate: false,
    })
}

/// Lands on the default surface and engages whatever the column holds.
fn fallback(
    mover: &Mover<'_>,
    tree: &VoxelTree,
    resolution: &TargetResolution,
) -> Result<Landing, ResultCode> {
    let top = resolution
        .surface
        .and_then(|surface| tree.record(surface))
        .map(|surface| surface.top())
        .ok_or(ResultCode::INVALID_LOCATION)?;
    let mut detonate = false;
    if let Some(target) = resolution.target.and_then(|target| tree.record(target)) {
        match classify(mover.owner, mover.weight, mover.abilities, target) {
            None => return Err(ResultCode::INVALID_OPERATION),
            Some(Interaction::Detonate) => detonate = true,
            Some(_) => {}
        }
    }
    check_reach(mover.abilities, mover.height, mover.altitude, top)?;
    Ok(Landing {
        altitude: top,
        detonate,
    })
}

pub(crate) fn commit(
    tree: &mut VoxelTree,
    plan: MovePlan<'_>,
    out: &mut Vec<Effect>,
) -> Result<(), WorldError> {
    let MovePlan {
        mover,
        cell,
        direction,
        landing,
        ..
    } = plan;

    tree.remove(mover.id)?;
    expand_uncovered(tree, mover.cell, mover.altitude, out)?;

    if landing.detonate {
        out.push(Effect::Explode {
            entity: mover.id,
            health_lost: mover.health,
        });
        resolve_detonation(tree, mover.table, mover.id, cell, landing.altitude, out)?;
        let _ = tree.kill(mover.id, false)?;
        out.push(Effect::Die { entity: mover.id });
        return expand_uncovered(tree, cell, landing.altitude, out);
    }

    resolve_arrival(tree, mover.table, mover.id, cell, landing.altitude, out)?;
    tree.record_checked_mut(mover.id)?.set_facing(direction);
    tree.place(mover.id, cell, landing.altitude)
}
