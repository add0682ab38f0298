//! Self-destruction against a nearby record.

use std::collections::VecDeque;

use voxel_battle_core::{AbilityTable, Coordinate, Effect, EntityId, ResultCode, VoxelKind};
use voxel_battle_world::{EntityRecord, TargetQuery, VoxelTree, WorldError};

use crate::{
    cell_at,
    resolution::{classify, eat, expand_uncovered, Interaction},
    with_fallback, Mover,
};

pub(crate) struct ExplodePlan<'a> {
    mover: Mover<'a>,
    pub(crate) target: EntityId,
    pub(crate) aimed_at: Coordinate,
}

pub(crate) fn validate<'a>(
    mover: &Mover<'a>,
    tree: &VoxelTree,
    to: Coordinate,
    target: EntityId,
) -> Result<ExplodePlan<'a>, ResultCode> {
    if !mover.abilities.can_explode {
        return Err(ResultCode::NOT_SUPPORTED);
    }
    if target == mover.id || !tree.contains(to) || !within_reach(mover.coordinate, to) {
        return Err(ResultCode::INVALID_ARGUMENTS);
    }
    if mover.collapsed {
        return Err(ResultCode::COLLAPSED_OR_BLOCKED);
    }

    let chosen = with_fallback(direct(mover, tree, to, target), || {
        fallback(mover, tree, to)
    })?;
    Ok(ExplodePlan {
        mover: *mover,
        target: chosen,
        aimed_at: to,
    })
}

/// At the coarser of the two levels `to` is the mover's own column or an
/// axis neighbour of it.
fn within_reach(origin: Coordinate, to: Coordinate) -> bool {
    let level = origin.weight.max(to.weight);
    origin.at_weight(level).manhattan_distance(to.at_weight(level)) <= 1
}

fn direct(
    mover: &Mover<'_>,
    tree: &VoxelTree,
    to: Coordinate,
    target: EntityId,
) -> Result<EntityId, ResultCode> {
    let record = tree
        .record(target)
        .filter(|record| record.is_alive())
        .ok_or(ResultCode::NOT_FOUND)?;
    let located = tree.coordinate_of(target).ok_or(ResultCode::NOT_FOUND)?;
    if (located.row, located.col, located.weight) != (to.row, to.col, to.weight) {
        return Err(ResultCode::NOT_FOUND);
    }
    if !is_explodable(mover, record) {
        return Err(ResultCode::INVALID_TARGET_LOCATION);
    }
    Ok(target)
}

fn fallback(mover: &Mover<'_>, tree: &VoxelTree, to: Coordinate) -> Result<EntityId, ResultCode> {
    let cell = cell_at(tree, to)?;
    let own = [mover.owner];
    let query = TargetQuery::new(mover.kind, mover.weight, mover.owner)
        .except(&own)
        .ignoring(mover.id);
    let resolution = tree.default_target_for(cell, &query);
    let candidate = resolution
        .target
        .or(resolution.surface)
        .ok_or(ResultCode::NOT_FOUND)?;
    let record = tree.record(candidate).ok_or(ResultCode::NOT_FOUND)?;
    if !is_explodable(mover, record) {
        return Err(ResultCode::INVALID_TARGET_LOCATION);
    }
    Ok(candidate)
}

fn is_explodable(mover: &Mover<'_>, record: &EntityRecord) -> bool {
    let delta = (record.weight() - mover.weight).abs();
    delta <= mover.abilities.explode_weight_delta
        && (record.kind() == VoxelKind::Ground || mover.owner.opposes(record.owner()))
}

pub(crate) fn commit(
    tree: &mut VoxelTree,
    plan: ExplodePlan<'_>,
    out: &mut Vec<Effect>,
) -> Result<(), WorldError> {
    let ExplodePlan { mover, target, .. } = plan;

    let riders = tree.remove_and_lower(mover.id)?;
    let health_lost = tree.kill(mover.id, false)?;
    out.push(Effect::Explode {
        entity: mover.id,
        health_lost,
    });
    out.push(Effect::Die { entity: mover.id });
    settle_fallen(tree, mover.table, riders, out)?;
    expand_uncovered(tree, mover.cell, mover.altitude, out)?;

    let Some(record) = tree.record(target) else {
        return Ok(());
    };
    if record.kind() == VoxelKind::Ground && record.health() > 1 {
        let remaining = record.health() - 1;
        tree.record_checked_mut(target)?.set_health(remaining)?;
        out.push(Effect::Explode {
            entity: target,
            health_lost: 1,
        });
        return Ok(());
    }

    let lost = if record.kind() == VoxelKind::Ground {
        1
    } else {
        record.health()
    };
    let (cell, altitude) = (record.cell(), record.altitude());
    let fallen = tree.remove_and_lower(target)?;
    let _ = tree.kill(target, false)?;
    out.push(Effect::Explode {
        entity: target,
        health_lost: lost,
    });
    out.push(Effect::Die { entity: target });
    settle_fallen(tree, mover.table, fallen, out)?;
    match cell {
        Some(cell) => expand_uncovered(tree, cell, altitude, out),
        None => Ok(()),
    }
}

/// Units that dropped onto the exposed column engage what they now rest on.
///
/// An opposing bomb blows the unit up. A lighter edible record is eaten and an
/// opposing one no heavier is destroyed; either way the column drops again
/// and the records above it are settled in turn.
fn settle_fallen(
    tree: &mut VoxelTree,
    table: &AbilityTable,
    fallen: Vec<EntityId>,
    out: &mut Vec<Effect>,
) -> Result<(), WorldError> {
    let mut pending = VecDeque::from(fallen);
    while let Some(id) = pending.pop_front() {
        let Some(record) = tree.record(id).cloned() else {
            continue;
        };
        let Some(cell) = record.cell() else {
            continue;
        };
        if !record.kind().is_unit() || record.is_collapsed() {
            continue;
        }
        let Some(beneath) = tree.below(id).and_then(|below| tree.record(below)).cloned() else {
            continue;
        };

        let abilities = table.lookup(record.owner(), record.kind());
        match classify(record.owner(), record.weight(), abilities, &beneath) {
            Some(Interaction::Detonate) => {
                pending.extend(tree.remove_and_lower(id)?);
                let health_lost = tree.kill(id, false)?;
                out.push(Effect::Explode {
                    entity: id,
                    health_lost,
                });
                out.push(Effect::Die { entity: id });
                expand_uncovered(tree, cell, record.altitude(), out)?;
            }
            Some(Interaction::Eat) => {
                pending.extend(tree.remove_and_lower(beneath.id())?);
                eat(tree, table, id, beneath.id(), out)?;
            }
            Some(Interaction::Destroy) => {
                pending.extend(tree.remove_and_lower(beneath.id())?);
                let _ = tree.kill(beneath.id(), false)?;
                out.push(Effect::Die {
                    entity: beneath.id(),
                });
            }
            Some(Interaction::Collapse) | None => {}
        }
    }
    Ok(())
}
