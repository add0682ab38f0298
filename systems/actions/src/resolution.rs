//! What happens to the records a unit lands on or leaves behind.

use voxel_battle_core::{AbilityTable, Effect, EntityId, Owner, ResultCode, VoxelAbilities};
use voxel_battle_world::{CellId, EntityRecord, VoxelTree, WorldError};

/// How an arriving unit engages a record in its landing column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interaction {
    /// The record is an opposing bomb; the arriving unit dies.
    Detonate,
    /// The record is absorbed and its health partly transferred.
    Eat,
    /// The record is removed outright.
    Destroy,
    /// The record is crushed under the arriving unit.
    Collapse,
}

/// Classifies how a unit of `owner` and `weight` engages `record`.
#[must_use]
pub fn classify(
    owner: Owner,
    weight: i32,
    abilities: &VoxelAbilities,
    record: &EntityRecord,
) -> Option<Interaction> {
    let other = record.owner();
    let friendly = other.is_neutral() || other == owner;

    if record.kind().is_detonator() && owner.opposes(other) {
        return Some(Interaction::Detonate);
    }
    if record.kind().is_edible()
        && friendly
        && record.weight() < weight
        && record.health() <= abilities.eat_health_ceiling
    {
        return Some(Interaction::Eat);
    }
    if record.weight() > weight {
        return None;
    }
    if owner.opposes(other) {
        return Some(Interaction::Destroy);
    }
    friendly.then_some(Interaction::Collapse)
}

/// Health an eater of `eater_weight` gains from `victim`, before clamping.
///
/// The victim's share of its own maximum is scaled to the eater's maximum and
/// divided by four per level of weight difference.
#[must_use]
pub fn eat_gain(
    eater_weight: i32,
    eater_max_health: i32,
    victim: &EntityRecord,
    victim_max_health: i32,
) -> i32 {
    let levels = (eater_weight - victim.weight()).max(0).unsigned_abs();
    let scale = 4_i64.saturating_pow(levels);
    let numerator = i64::from(victim.health()) * i64::from(eater_max_health);
    let denominator = i64::from(victim_max_health.max(1)).saturating_mul(scale);
    let rounded = (2 * numerator + denominator) / (2 * denominator);
    i32::try_from(rounded).unwrap_or(i32::MAX)
}

/// Reports whether a climb or drop of `from -> to` is within reach of a
/// unit of `height`.
pub(crate) fn check_reach(
    abilities: &VoxelAbilities,
    height: i32,
    from: i32,
    to: i32,
) -> Result<(), ResultCode> {
    let climb = to - from;
    if climb > abilities.max_jump_height.saturating_mul(height) {
        return Err(ResultCode::UNABLE_TO_MOVE);
    }
    if -climb > abilities.max_fall_height.saturating_mul(height) {
        return Err(ResultCode::UNABLE_TO_MOVE);
    }
    Ok(())
}

/// Resolves everything at or above `altitude` in `cell` and its descendants
/// against the detached record `arriving`.
pub(crate) fn resolve_arrival(
    tree: &mut VoxelTree,
    table: &AbilityTable,
    arriving: EntityId,
    cell: CellId,
    altitude: i32,
    out: &mut Vec<Effect>,
) -> Result<(), WorldError> {
    resolve_column(tree, table, arriving, cell, altitude, true, out)
}

/// Like [`resolve_arrival`] for a unit that has already blown up on arrival.
/// Its health is gone, so edible records are crushed instead of eaten.
pub(crate) fn resolve_detonation(
    tree: &mut VoxelTree,
    table: &AbilityTable,
    arriving: EntityId,
    cell: CellId,
    altitude: i32,
    out: &mut Vec<Effect>,
) -> Result<(), WorldError> {
    resolve_column(tree, table, arriving, cell, altitude, false, out)
}

fn resolve_column(
    tree: &mut VoxelTree,
    table: &AbilityTable,
    arriving: EntityId,
    cell: CellId,
    altitude: i32,
    eats: bool,
    out: &mut Vec<Effect>,
) -> Result<(), WorldError> {
    for id in tree.records_at_or_above(cell, altitude, Some(arriving)) {
        let mover = tree.record_checked(arriving)?.clone();
        let abilities = table.lookup(mover.owner(), mover.kind());
        let Some(record) = tree.record(id).cloned() else {
            continue;
        };

        let interaction = classify(mover.owner(), mover.weight(), abilities, &record);
        if eats && interaction == Some(Interaction::Eat) {
            eat(tree, table, arriving, id, out)?;
            continue;
        }

        let opposing = mover.owner().opposes(record.owner());
        if opposing || (record.altitude() > altitude && !record.kind().is_unit()) {
            let _ = tree.kill(id, false)?;
            out.push(Effect::Die { entity: id });
            continue;
        }

        let fall_distance = record.altitude() - altitude;
        let crushed = tree.record_checked_mut(id)?;
        crushed.set_altitude(altitude);
        if crushed.set_collapsed(true) {
            out.push(Effect::Collapse {
                entity: id,
                fall_distance,
            });
        }
    }
    tracing::trace!(
        target: "voxel_battle::actions",
        entity = arriving.get(),
        altitude,
        eats,
        "arrival.resolved"
    );
    Ok(())
}

/// `eater` absorbs `victim`, gaining health scaled by [`eat_gain`] and
/// clamped to its bounds. A linked victim is unlinked without lowering.
pub(crate) fn eat(
    tree: &mut VoxelTree,
    table: &AbilityTable,
    eater: EntityId,
    victim: EntityId,
    out: &mut Vec<Effect>,
) -> Result<(), WorldError> {
    let mover = tree.record_checked(eater)?;
    let (health, weight) = (mover.health(), mover.weight());
    let abilities = table.lookup(mover.owner(), mover.kind());
    let record = tree.record_checked(victim)?;
    let victim_max = table.lookup(record.owner(), record.kind()).max_health;
    let gain = eat_gain(weight, abilities.max_health, record, victim_max);
    let updated = health
        .saturating_add(gain)
        .clamp(abilities.min_health.max(1), abilities.max_health.max(1));

    let lost = tree.kill(victim, false)?;
    tree.record_checked_mut(eater)?.set_health(updated)?;
    out.push(Effect::Eat {
        attacker: eater,
        victim,
        health_gained: updated - health,
        victim_health_lost: lost,
    });
    Ok(())
}

/// Expands collapsed records left at `altitude` in `cell` and its
/// descendants once nothing rests on them any more, coarse level first.
pub(crate) fn expand_uncovered(
    tree: &mut VoxelTree,
    cell: CellId,
    altitude: i32,
    out: &mut Vec<Effect>,
) -> Result<(), WorldError> {
    let column: Vec<CellId> = std::iter::once(cell).chain(tree.descendants(cell)).collect();
    for level in column {
        for id in tree.stack(level) {
            let record = tree.record_checked(id)?;
            if !record.is_collapsed() || record.altitude() != altitude || tree.is_covered(id) {
                continue;
            }
            if tree.record_checked_mut(id)?.set_collapsed(false) {
                out.push(Effect::Expand { entity: id });
            }
        }
    }
    Ok(())
}
