//! Swapping a unit's kind in place.

use voxel_battle_core::{default_height, Effect, EntityId, ResultCode, VoxelKind};
use voxel_battle_world::{is_base_for, RecordSpec, VoxelTree, WorldError};

use crate::Mover;

pub(crate) struct ConvertPlan<'a> {
    mover: Mover<'a>,
    spec: RecordSpec,
}

pub(crate) fn validate<'a>(
    mover: &Mover<'a>,
    tree: &VoxelTree,
    kind: VoxelKind,
) -> Result<ConvertPlan<'a>, ResultCode> {
    if !mover.abilities.can_convert || kind == VoxelKind::Eatable {
        return Err(ResultCode::NOT_SUPPORTED);
    }
    if kind == mover.kind {
        return Err(ResultCode::INVALID_ARGUMENTS);
    }
    let target = mover.table.lookup(mover.owner, kind);
    if mover.weight < target.min_weight {
        return Err(ResultCode::MIN_WEIGHT);
    }
    if mover.weight > target.max_weight {
        return Err(ResultCode::MAX_WEIGHT);
    }
    mover.ensure_free(tree)?;

    let supported = tree
        .below(mover.id)
        .and_then(|below| tree.record(below))
        .is_some_and(|below| is_base_for(below, kind, mover.weight));
    if !supported {
        return Err(ResultCode::INVALID_LOCATION);
    }
    if kind == VoxelKind::Spawner {
        let alone = tree.stack(mover.cell) == [mover.id]
            && tree
                .descendants(mover.cell)
                .into_iter()
                .all(|cell| tree.cell(cell).is_empty());
        if !alone {
            return Err(ResultCode::INVALID_LOCATION);
        }
    }

    Ok(ConvertPlan {
        mover: *mover,
        spec: RecordSpec {
            kind,
            owner: mover.owner,
            weight: mover.weight,
            health: target.default_health.max(1),
            height: default_height(mover.weight),
            altitude: mover.altitude,
            facing: mover.facing,
        },
    })
}

pub(crate) fn commit(
    tree: &mut VoxelTree,
    plan: ConvertPlan<'_>,
    out: &mut Vec<Effect>,
) -> Result<EntityId, WorldError> {
    let ConvertPlan { mover, spec } = plan;
    let converted = tree.replace(mover.id, spec)?;
    out.push(Effect::Die { entity: mover.id });
    if let Some(at) = tree.coordinate_of(converted) {
        out.push(Effect::Create {
            entity: converted,
            at,
        });
    }
    Ok(converted)
}
