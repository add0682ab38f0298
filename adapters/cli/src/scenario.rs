//! Seeded battlefield generation for the replay harness.
//!
//! The battlefield is a grid of weight-2 ground blocks with two player
//! corners. Each corner holds a spawner on its own block and an eater and a
//! bomb on the neighbouring block; neutral eatables are scattered over the
//! remaining blocks. Record ids are stable for a given tree weight: one ground
//! per block first, then each owner's spawner, eater and bomb, then food.

use anyhow::{ensure, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use voxel_battle_core::{default_height, AbilityTable, Direction, Owner, VoxelKind};
use voxel_battle_world::{RecordSpec, VoxelTree};

/// Smallest tree weight that fits both player corners.
pub(crate) const MIN_BATTLEFIELD_WEIGHT: i32 = 3;

const TERRAIN_WEIGHT: i32 = 2;
const UNIT_WEIGHT: i32 = 1;
const FOOD_WEIGHT: i32 = 0;

/// Builds the battlefield for `weight` and `seed`.
pub(crate) fn generate(weight: i32, seed: u64, abilities: &AbilityTable) -> Result<VoxelTree> {
    ensure!(
        weight >= MIN_BATTLEFIELD_WEIGHT,
        "battlefield weight must be at least {MIN_BATTLEFIELD_WEIGHT}, got {weight}"
    );
    let mut tree = VoxelTree::new(weight)?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let blocks: usize = 1 << (weight - TERRAIN_WEIGHT);
    let base = default_height(TERRAIN_WEIGHT);

    let mut tops = Vec::with_capacity(blocks * blocks);
    for row in 0..blocks {
        for col in 0..blocks {
            let height = base + 2 * rng.gen_range(0..=1);
            let cell = tree.resolve(row as i32, col as i32, TERRAIN_WEIGHT)?;
            let ground = spec(abilities, VoxelKind::Ground, Owner::NEUTRAL, TERRAIN_WEIGHT, 0);
            let _ = tree.create(cell, RecordSpec { height, ..ground })?;
            tops.push(height);
        }
    }
    let top = |row: usize, col: usize| tops[row * blocks + col];

    let last = blocks - 1;
    let corners = [
        (Owner::new(1), (0, 0), (0, 1), Direction::South),
        (Owner::new(2), (last, last), (last, last - 1), Direction::North),
    ];
    for (owner, home, camp, facing) in corners {
        let cell = tree.resolve(home.0 as i32, home.1 as i32, TERRAIN_WEIGHT)?;
        let altitude = top(home.0, home.1);
        let spawner = spec(abilities, VoxelKind::Spawner, owner, TERRAIN_WEIGHT, altitude);
        let _ = tree.create(cell, RecordSpec { facing, ..spawner })?;

        let altitude = top(camp.0, camp.1);
        let row = 2 * camp.0 as i32 + i32::from(camp.0 != 0);
        for (offset, kind) in [VoxelKind::Eater, VoxelKind::Bomb].into_iter().enumerate() {
            let col = 2 * camp.1 as i32 + offset as i32;
            let cell = tree.resolve(row, col, UNIT_WEIGHT)?;
            let unit = spec(abilities, kind, owner, UNIT_WEIGHT, altitude);
            let _ = tree.create(cell, RecordSpec { facing, ..unit })?;
        }
    }

    let occupied = [(0, 0), (0, 1), (last, last), (last, last - 1)];
    let span = 1 << (TERRAIN_WEIGHT - FOOD_WEIGHT);
    for row in 0..blocks {
        for col in 0..blocks {
            if occupied.contains(&(row, col)) || !rng.gen_bool(0.5) {
                continue;
            }
            let fine_row = (row * span + rng.gen_range(0..span)) as i32;
            let fine_col = (col * span + rng.gen_range(0..span)) as i32;
            let cell = tree.resolve(fine_row, fine_col, FOOD_WEIGHT)?;
            let altitude = top(row, col);
            let food = spec(abilities, VoxelKind::Eatable, Owner::NEUTRAL, FOOD_WEIGHT, altitude);
            let _ = tree.create(cell, food)?;
        }
    }

    tracing::info!(
        target: "voxel_battle::cli",
        weight,
        seed,
        records = tree.records().count(),
        "battlefield.generated"
    );
    Ok(tree)
}

fn spec(
    abilities: &AbilityTable,
    kind: VoxelKind,
    owner: Owner,
    weight: i32,
    altitude: i32,
) -> RecordSpec {
    RecordSpec {
        kind,
        owner,
        weight,
        health: abilities.lookup(owner, kind).default_health.max(1),
        height: default_height(weight),
        altitude,
        facing: Direction::North,
    }
}
