use voxel_battle_core::{
    default_height, AbilityTable, Command, Coordinate, Direction, Effect, EntityId, Owner,
    ResultCode, UnitState, VoxelKind,
};
use voxel_battle_system_actions::ActionController;
use voxel_battle_world::{query, EntityRecord, RecordSpec, VoxelTree};

const BLUE: Owner = Owner::new(1);
const RED: Owner = Owner::new(2);

fn put(
    tree: &mut VoxelTree,
    kind: VoxelKind,
    owner: Owner,
    at: Coordinate,
    health: i32,
) -> EntityId {
    let cell = tree.locate(at).expect("cell");
    tree.create(
        cell,
        RecordSpec {
            kind,
            owner,
            weight: at.weight,
            health,
            height: default_height(at.weight),
            altitude: at.altitude,
            facing: Direction::North,
        },
    )
    .expect("create")
}

fn ground(tree: &mut VoxelTree, row: i32, col: i32, weight: i32, altitude: i32) -> EntityId {
    put(
        tree,
        VoxelKind::Ground,
        Owner::NEUTRAL,
        Coordinate::new(row, col, weight, altitude),
        3,
    )
}

/// Two flat weight-1 ground blocks side by side on a depth-2 tree.
fn flat_pair() -> VoxelTree {
    let mut tree = VoxelTree::new(2).expect("tree");
    let _ = ground(&mut tree, 0, 0, 1, 0);
    let _ = ground(&mut tree, 0, 1, 1, 0);
    tree
}

fn run(
    tree: &mut VoxelTree,
    controller: &mut ActionController<'_>,
    command: Command,
) -> (ResultCode, Vec<Effect>) {
    let mut effects = Vec::new();
    let code = controller.apply(tree, command, &mut effects);
    (code, effects)
}

fn step(to: Coordinate) -> Command {
    Command::Move {
        to,
        is_last_step: false,
    }
}

#[test]
fn eater_moving_onto_food_eats_it() {
    let abilities = AbilityTable::default();
    let mut tree = VoxelTree::new(4).expect("tree");
    let _ = ground(&mut tree, 0, 0, 3, 0);
    let _ = ground(&mut tree, 0, 1, 3, 0);
    let eater = put(&mut tree, VoxelKind::Eater, BLUE, Coordinate::new(0, 0, 3, 8), 8);
    let food = put(
        &mut tree,
        VoxelKind::Eatable,
        Owner::NEUTRAL,
        Coordinate::new(0, 4, 1, 8),
        1,
    );

    let mut controller = ActionController::new(eater, &abilities);
    let destination = Coordinate::new(0, 1, 3, 8);
    let (code, effects) = run(&mut tree, &mut controller, step(destination));

    assert_eq!(code, ResultCode::SUCCESS);
    assert_eq!(
        effects,
        vec![Effect::Eat {
            attacker: eater,
            victim: food,
            health_gained: 1,
            victim_health_lost: 1,
        }]
    );
    assert!(tree.record(food).is_none());
    assert_eq!(tree.coordinate_of(eater), Some(destination));
    assert_eq!(tree.record(eater).map(EntityRecord::health), Some(9));
    assert_eq!(tree.record(eater).map(EntityRecord::facing), Some(Direction::East));
    assert_eq!(controller.targeting().last_destination, Some(destination));
}

#[test]
fn split4_at_minimum_weight_leaves_the_tree_untouched() {
    let abilities = AbilityTable::default();
    let mut tree = VoxelTree::new(2).expect("tree");
    let _ = ground(&mut tree, 0, 0, 2, 0);
    let eater = put(&mut tree, VoxelKind::Eater, BLUE, Coordinate::new(1, 1, 0, 4), 16);
    let before = query::fingerprint(&tree).expect("fingerprint");

    let mut controller = ActionController::new(eater, &abilities);
    let (code, effects) = run(&mut tree, &mut controller, Command::Split4);

    assert_eq!(code, ResultCode::MIN_WEIGHT);
    assert!(code.is_hard_fail());
    assert!(effects.is_empty());
    assert_eq!(query::fingerprint(&tree).expect("fingerprint"), before);
    assert_eq!(controller.entity(), eater);
}

#[test]
fn split4_fills_every_quadrant_with_half_height_clones() {
    let abilities = AbilityTable::default();
    let mut tree = VoxelTree::new(3).expect("tree");
    let _ = ground(&mut tree, 0, 0, 3, 0);
    let eater = put(&mut tree, VoxelKind::Eater, BLUE, Coordinate::new(0, 0, 2, 8), 8);
    let first = tree.next_entity_id();

    let mut controller = ActionController::new(eater, &abilities);
    let (code, effects) = run(&mut tree, &mut controller, Command::Split4);

    assert_eq!(code, ResultCode::SUCCESS);
    assert_eq!(effects.len(), 5);
    assert_eq!(effects[0], Effect::Die { entity: eater });
    assert_eq!(
        effects[1],
        Effect::Create {
            entity: first,
            at: Coordinate::new(0, 0, 1, 8),
        }
    );
    assert_eq!(controller.entity(), first);
    let clones = query::records_of(&tree, VoxelKind::Eater, Some(BLUE), Some(1));
    assert_eq!(clones.len(), 4);
    assert!(clones.iter().all(|at| at.altitude == 8));
    assert_eq!(tree.record(first).map(EntityRecord::height), Some(2));
    assert_eq!(tree.record(first).map(EntityRecord::health), Some(8));
}

#[test]
fn exploding_into_ground_removes_one_health() {
    let abilities = AbilityTable::default();
    let mut tree = VoxelTree::new(2).expect("tree");
    let _ = ground(&mut tree, 0, 0, 1, 0);
    let target = ground(&mut tree, 0, 1, 1, 0);
    let bomb = put(&mut tree, VoxelKind::Bomb, BLUE, Coordinate::new(0, 1, 0, 2), 4);

    let mut controller = ActionController::new(bomb, &abilities);
    let command = Command::Explode {
        to: Coordinate::new(0, 1, 1, 0),
        target,
    };
    let (code, effects) = run(&mut tree, &mut controller, command);

    assert_eq!(code, ResultCode::SUCCESS);
    assert_eq!(
        effects,
        vec![
            Effect::Explode {
                entity: bomb,
                health_lost: 4,
            },
            Effect::Die { entity: bomb },
            Effect::Explode {
                entity: target,
                health_lost: 1,
            },
        ]
    );
    assert_eq!(tree.record(target).map(EntityRecord::health), Some(2));
    assert!(tree.record(bomb).is_none());
    assert_eq!(controller.targeting().last_target, Some(target));
}

#[test]
fn ground_dies_only_when_its_last_health_is_blown_away() {
    let abilities = AbilityTable::default();
    let mut tree = VoxelTree::new(2).expect("tree");
    let _ = ground(&mut tree, 0, 0, 1, 0);
    let brittle = put(
        &mut tree,
        VoxelKind::Ground,
        Owner::NEUTRAL,
        Coordinate::new(0, 1, 1, 0),
        1,
    );
    let rider = put(&mut tree, VoxelKind::Eater, RED, Coordinate::new(0, 1, 1, 2), 8);
    let bomb = put(&mut tree, VoxelKind::Bomb, BLUE, Coordinate::new(0, 0, 1, 2), 4);

    let mut controller = ActionController::new(bomb, &abilities);
    let command = Command::Explode {
        to: Coordinate::new(0, 1, 1, 0),
        target: brittle,
    };
    let (code, effects) = run(&mut tree, &mut controller, command);

    assert_eq!(code, ResultCode::SUCCESS);
    assert_eq!(
        effects[2..],
        [
            Effect::Explode {
                entity: brittle,
                health_lost: 1,
            },
            Effect::Die { entity: brittle },
        ]
    );
    assert!(tree.record(brittle).is_none());
    assert_eq!(tree.record(rider).map(EntityRecord::altitude), Some(0));
}

#[test]
fn explosion_out_of_reach_is_rejected() {
    let abilities = AbilityTable::default();
    let mut tree = VoxelTree::new(3).expect("tree");
    let _ = ground(&mut tree, 0, 0, 1, 0);
    let far = ground(&mut tree, 0, 3, 1, 0);
    let bomb = put(&mut tree, VoxelKind::Bomb, BLUE, Coordinate::new(0, 0, 1, 2), 4);

    let controller = ActionController::new(bomb, &abilities);
    let command = Command::Explode {
        to: Coordinate::new(0, 3, 1, 0),
        target: far,
    };
    assert_eq!(controller.validate(&tree, &command), ResultCode::INVALID_ARGUMENTS);

    let terrain = ActionController::new(far, &abilities);
    assert_eq!(
        terrain.validate(&tree, &command),
        ResultCode::NOT_SUPPORTED
    );
}

#[test]
fn covered_and_collapsed_units_cannot_move() {
    let abilities = AbilityTable::default();
    let mut tree = flat_pair();
    let under = put(&mut tree, VoxelKind::Eater, BLUE, Coordinate::new(0, 0, 1, 2), 8);
    let _ = put(&mut tree, VoxelKind::Eater, BLUE, Coordinate::new(0, 0, 1, 4), 8);
    let destination = step(Coordinate::new(0, 1, 1, 2));

    let controller = ActionController::new(under, &abilities);
    let code = controller.validate(&tree, &destination);
    assert_eq!(code, ResultCode::COLLAPSED_OR_BLOCKED);
    assert!(code.is_hard_fail());

    let mut tree = flat_pair();
    let crushed = put(&mut tree, VoxelKind::Eater, BLUE, Coordinate::new(0, 0, 1, 2), 8);
    let _ = tree.record_mut(crushed).expect("record").set_collapsed(true);
    let controller = ActionController::new(crushed, &abilities);
    assert_eq!(
        controller.validate(&tree, &destination),
        ResultCode::COLLAPSED_OR_BLOCKED
    );
}

#[test]
fn climbing_beyond_the_jump_limit_fails_softly() {
    let abilities = AbilityTable::default();
    let mut tree = flat_pair();
    let _ = ground(&mut tree, 0, 1, 1, 2);
    let _ = ground(&mut tree, 0, 1, 1, 4);
    let eater = put(&mut tree, VoxelKind::Eater, BLUE, Coordinate::new(0, 0, 1, 2), 8);

    let controller = ActionController::new(eater, &abilities);
    let code = controller.validate(&tree, &step(Coordinate::new(0, 1, 1, 6)));
    assert_eq!(code, ResultCode::UNABLE_TO_MOVE);
    assert!(!code.is_hard_fail());

    let mut tree = flat_pair();
    let _ = ground(&mut tree, 0, 1, 1, 2);
    let eater = put(&mut tree, VoxelKind::Eater, BLUE, Coordinate::new(0, 0, 1, 2), 8);
    let controller = ActionController::new(eater, &abilities);
    assert_eq!(
        controller.validate(&tree, &step(Coordinate::new(0, 1, 1, 4))),
        ResultCode::SUCCESS
    );
}

#[test]
fn moving_rejects_non_adjacent_destinations() {
    let abilities = AbilityTable::default();
    let mut tree = flat_pair();
    let eater = put(&mut tree, VoxelKind::Eater, BLUE, Coordinate::new(0, 0, 1, 2), 8);
    let controller = ActionController::new(eater, &abilities);

    for to in [
        Coordinate::new(1, 1, 1, 2),
        Coordinate::new(0, 2, 1, 2),
        Coordinate::new(0, 1, 0, 2),
        Coordinate::new(0, -1, 1, 2),
    ] {
        assert_eq!(
            controller.validate(&tree, &step(to)),
            ResultCode::INVALID_ARGUMENTS,
            "{to:?}"
        );
    }

    let missing = ActionController::new(EntityId::new(999), &abilities);
    assert_eq!(
        missing.validate(&tree, &step(Coordinate::new(0, 1, 1, 2))),
        ResultCode::NO_UNIT
    );
}

#[test]
fn last_step_waits_for_a_busy_friend_and_crushes_an_idle_one() {
    let abilities = AbilityTable::default();
    let mut tree = flat_pair();
    let mover = put(&mut tree, VoxelKind::Eater, BLUE, Coordinate::new(0, 0, 1, 2), 8);
    let friend = put(&mut tree, VoxelKind::Eater, BLUE, Coordinate::new(0, 1, 1, 2), 8);
    tree.record_mut(friend)
        .expect("friend")
        .set_state(UnitState::Busy);
    let to = Coordinate::new(0, 1, 1, 2);

    let mut controller = ActionController::new(mover, &abilities);
    let last = Command::Move {
        to,
        is_last_step: true,
    };
    let (code, effects) = run(&mut tree, &mut controller, last);
    assert_eq!(code, ResultCode::UNABLE_TO_MOVE);
    assert!(effects.is_empty());

    let (code, effects) = run(&mut tree, &mut controller, step(to));
    assert_eq!(code, ResultCode::SUCCESS);
    assert_eq!(
        effects,
        vec![Effect::Collapse {
            entity: friend,
            fall_distance: 0,
        }]
    );
    assert_eq!(controller.targeting().last_target, Some(friend));

    let (code, effects) = run(&mut tree, &mut controller, step(Coordinate::new(0, 0, 1, 2)));
    assert_eq!(code, ResultCode::SUCCESS);
    assert_eq!(effects, vec![Effect::Expand { entity: friend }]);
    assert_eq!(tree.record(friend).map(EntityRecord::height), Some(2));
}

#[test]
fn moving_onto_an_enemy_destroys_it() {
    let abilities = AbilityTable::default();
    let mut tree = flat_pair();
    let mover = put(&mut tree, VoxelKind::Eater, BLUE, Coordinate::new(0, 0, 1, 2), 8);
    let enemy = put(&mut tree, VoxelKind::Eater, RED, Coordinate::new(0, 1, 1, 2), 8);

    let mut controller = ActionController::new(mover, &abilities);
    let (code, effects) = run(&mut tree, &mut controller, step(Coordinate::new(0, 1, 1, 2)));

    assert_eq!(code, ResultCode::SUCCESS);
    assert_eq!(effects, vec![Effect::Die { entity: enemy }]);
    assert!(tree.record(enemy).is_none());
    assert_eq!(tree.coordinate_of(mover), Some(Coordinate::new(0, 1, 1, 2)));
}

#[test]
fn stepping_onto_an_opposing_bomb_detonates_the_mover() {
    let abilities = AbilityTable::default();
    let mut tree = flat_pair();
    let mover = put(&mut tree, VoxelKind::Eater, BLUE, Coordinate::new(0, 0, 1, 2), 8);
    let bomb = put(&mut tree, VoxelKind::Bomb, RED, Coordinate::new(0, 1, 1, 2), 4);
    let friend = put(&mut tree, VoxelKind::Eater, BLUE, Coordinate::new(0, 2, 0, 2), 8);

    let mut controller = ActionController::new(mover, &abilities);
    let (code, effects) = run(&mut tree, &mut controller, step(Coordinate::new(0, 1, 1, 2)));

    assert_eq!(code, ResultCode::SUCCESS);
    assert_eq!(
        effects,
        vec![
            Effect::Explode {
                entity: mover,
                health_lost: 8,
            },
            Effect::Die { entity: bomb },
            Effect::Collapse {
                entity: friend,
                fall_distance: 0,
            },
            Effect::Die { entity: mover },
            Effect::Expand { entity: friend },
        ]
    );
    assert!(tree.record(mover).is_none());
    assert!(tree.record(bomb).is_none());
    assert_eq!(tree.record(friend).map(EntityRecord::is_collapsed), Some(false));
}

#[test]
fn a_busy_friend_in_a_finer_quadrant_blocks_the_last_step() {
    let abilities = AbilityTable::default();
    let mut tree = flat_pair();
    let mover = put(&mut tree, VoxelKind::Eater, BLUE, Coordinate::new(0, 0, 1, 2), 8);
    let friend = put(&mut tree, VoxelKind::Bomb, BLUE, Coordinate::new(0, 2, 0, 2), 4);
    tree.record_mut(friend)
        .expect("friend")
        .set_state(UnitState::Busy);
    let to = Coordinate::new(0, 1, 1, 2);

    let mut controller = ActionController::new(mover, &abilities);
    let last = Command::Move {
        to,
        is_last_step: true,
    };
    let (code, effects) = run(&mut tree, &mut controller, last);
    assert_eq!(code, ResultCode::UNABLE_TO_MOVE);
    assert!(effects.is_empty());

    let (code, effects) = run(&mut tree, &mut controller, step(to));
    assert_eq!(code, ResultCode::SUCCESS);
    assert_eq!(
        effects,
        vec![Effect::Collapse {
            entity: friend,
            fall_distance: 0,
        }]
    );
}

#[test]
fn dropping_beyond_the_fall_limit_fails_softly() {
    let abilities = AbilityTable::default();
    let mut tree = flat_pair();
    for altitude in [2, 4, 6] {
        let _ = ground(&mut tree, 0, 0, 1, altitude);
    }
    let eater = put(&mut tree, VoxelKind::Eater, BLUE, Coordinate::new(0, 0, 1, 8), 8);
    let controller = ActionController::new(eater, &abilities);
    let code = controller.validate(&tree, &step(Coordinate::new(0, 1, 1, 2)));
    assert_eq!(code, ResultCode::UNABLE_TO_MOVE);
    assert!(!code.is_hard_fail());

    let mut tree = flat_pair();
    for altitude in [2, 4] {
        let _ = ground(&mut tree, 0, 0, 1, altitude);
    }
    let eater = put(&mut tree, VoxelKind::Eater, BLUE, Coordinate::new(0, 0, 1, 6), 8);
    let controller = ActionController::new(eater, &abilities);
    assert_eq!(
        controller.validate(&tree, &step(Coordinate::new(0, 1, 1, 2))),
        ResultCode::SUCCESS
    );
}

#[test]
fn blowing_up_a_unit_expands_what_it_had_crushed() {
    let abilities = AbilityTable::default();
    let mut tree = flat_pair();
    let eater = put(&mut tree, VoxelKind::Eater, RED, Coordinate::new(0, 0, 1, 2), 8);
    let crushed = put(&mut tree, VoxelKind::Bomb, RED, Coordinate::new(0, 1, 1, 2), 4);
    let mut controller = ActionController::new(eater, &abilities);
    let (code, effects) = run(&mut tree, &mut controller, step(Coordinate::new(0, 1, 1, 2)));
    assert_eq!(code, ResultCode::SUCCESS);
    assert_eq!(
        effects,
        vec![Effect::Collapse {
            entity: crushed,
            fall_distance: 0,
        }]
    );

    let bomb = put(&mut tree, VoxelKind::Bomb, BLUE, Coordinate::new(0, 0, 1, 2), 4);
    let mut controller = ActionController::new(bomb, &abilities);
    let command = Command::Explode {
        to: Coordinate::new(0, 1, 1, 2),
        target: eater,
    };
    let (code, effects) = run(&mut tree, &mut controller, command);
    assert_eq!(code, ResultCode::SUCCESS);
    assert_eq!(
        effects,
        vec![
            Effect::Explode {
                entity: bomb,
                health_lost: 4,
            },
            Effect::Die { entity: bomb },
            Effect::Explode {
                entity: eater,
                health_lost: 8,
            },
            Effect::Die { entity: eater },
            Effect::Expand { entity: crushed },
        ]
    );
    assert_eq!(tree.record(crushed).map(EntityRecord::height), Some(2));

    let survivor = ActionController::new(crushed, &abilities);
    assert_eq!(
        survivor.validate(&tree, &step(Coordinate::new(0, 0, 1, 2))),
        ResultCode::SUCCESS
    );
}

#[test]
fn units_falling_into_a_blown_column_destroy_enemies_beneath() {
    let abilities = AbilityTable::default();
    let mut tree = flat_pair();
    let buried = put(&mut tree, VoxelKind::Eater, RED, Coordinate::new(0, 1, 1, 2), 8);
    let brittle = put(
        &mut tree,
        VoxelKind::Ground,
        Owner::NEUTRAL,
        Coordinate::new(0, 1, 1, 4),
        1,
    );
    let rider = put(&mut tree, VoxelKind::Eater, BLUE, Coordinate::new(0, 1, 1, 6), 8);
    let bomb = put(&mut tree, VoxelKind::Bomb, BLUE, Coordinate::new(0, 0, 1, 2), 4);

    let mut controller = ActionController::new(bomb, &abilities);
    let command = Command::Explode {
        to: Coordinate::new(0, 1, 1, 4),
        target: brittle,
    };
    let (code, effects) = run(&mut tree, &mut controller, command);

    assert_eq!(code, ResultCode::SUCCESS);
    assert_eq!(
        effects[2..],
        [
            Effect::Explode {
                entity: brittle,
                health_lost: 1,
            },
            Effect::Die { entity: brittle },
            Effect::Die { entity: buried },
        ]
    );
    assert!(tree.record(buried).is_none());
    assert_eq!(tree.coordinate_of(rider), Some(Coordinate::new(0, 1, 1, 2)));
}

#[test]
fn explosion_falls_back_to_the_enemy_in_the_aimed_column() {
    let abilities = AbilityTable::default();
    let mut tree = flat_pair();
    let stray = tree.records().next().map(EntityRecord::id).expect("ground");
    let enemy = put(&mut tree, VoxelKind::Eater, RED, Coordinate::new(0, 1, 1, 2), 8);
    let bomb = put(&mut tree, VoxelKind::Bomb, BLUE, Coordinate::new(0, 0, 1, 2), 4);
    let to = Coordinate::new(0, 1, 1, 2);

    let mut controller = ActionController::new(bomb, &abilities);
    let self_target = Command::Explode { to, target: bomb };
    assert_eq!(
        controller.validate(&tree, &self_target),
        ResultCode::INVALID_ARGUMENTS
    );

    let misaimed = Command::Explode { to, target: stray };
    let (code, effects) = run(&mut tree, &mut controller, misaimed);
    assert_eq!(code, ResultCode::SUCCESS);
    assert_eq!(
        effects[2..],
        [
            Effect::Explode {
                entity: enemy,
                health_lost: 8,
            },
            Effect::Die { entity: enemy },
        ]
    );
    assert_eq!(controller.targeting().last_target, Some(enemy));
    assert_eq!(tree.record(stray).map(EntityRecord::health), Some(3));

    let mut tree = flat_pair();
    let stray = tree.records().next().map(EntityRecord::id).expect("ground");
    let _ = put(&mut tree, VoxelKind::Eater, BLUE, Coordinate::new(0, 1, 1, 2), 8);
    let bomb = put(&mut tree, VoxelKind::Bomb, BLUE, Coordinate::new(0, 0, 1, 2), 4);
    let controller = ActionController::new(bomb, &abilities);
    assert_eq!(
        controller.validate(&tree, &Command::Explode { to, target: stray }),
        ResultCode::INVALID_TARGET_LOCATION
    );
}

#[test]
fn split_places_a_clone_in_the_first_free_neighbour() {
    let abilities = AbilityTable::default();
    let mut tree = flat_pair();
    let eater = put(&mut tree, VoxelKind::Eater, BLUE, Coordinate::new(0, 0, 1, 2), 8);

    let mut controller = ActionController::new(eater, &abilities);
    assert_eq!(
        controller.validate(&tree, &Command::Split),
        ResultCode::NEED_MORE_RESOURCES
    );

    tree.record_mut(eater)
        .expect("eater")
        .set_health(16)
        .expect("health");
    let stay = tree.next_entity_id();
    let sibling = EntityId::new(stay.get() + 1);
    let (code, effects) = run(&mut tree, &mut controller, Command::Split);

    assert_eq!(code, ResultCode::SUCCESS);
    assert_eq!(
        effects,
        vec![
            Effect::Die { entity: eater },
            Effect::Create {
                entity: stay,
                at: Coordinate::new(0, 0, 1, 2),
            },
            Effect::Create {
                entity: sibling,
                at: Coordinate::new(0, 1, 1, 2),
            },
        ]
    );
    assert_eq!(controller.entity(), stay);
    assert_eq!(tree.record(stay).map(EntityRecord::health), Some(8));
    assert_eq!(
        tree.record(sibling).map(EntityRecord::facing),
        Some(Direction::East)
    );
}

#[test]
fn grow_then_diminish_restores_weight_and_altitude() {
    let abilities = AbilityTable::default();
    let mut tree = VoxelTree::new(3).expect("tree");
    let _ = ground(&mut tree, 0, 0, 2, 0);
    let eater = put(&mut tree, VoxelKind::Eater, BLUE, Coordinate::new(0, 0, 1, 4), 16);
    let mut controller = ActionController::new(eater, &abilities);

    let (code, _) = run(&mut tree, &mut controller, Command::Grow);
    assert_eq!(code, ResultCode::SUCCESS);
    assert_eq!(tree.coordinate_of(eater), Some(Coordinate::new(0, 0, 2, 4)));
    assert_eq!(tree.record(eater).map(EntityRecord::height), Some(4));

    let (code, _) = run(&mut tree, &mut controller, Command::Diminish);
    assert_eq!(code, ResultCode::SUCCESS);
    assert_eq!(tree.coordinate_of(eater), Some(Coordinate::new(0, 0, 1, 4)));
    assert_eq!(tree.record(eater).map(EntityRecord::height), Some(2));
    assert_eq!(controller.entity(), eater);
}

#[test]
fn grow_needs_full_health_and_a_parent_level() {
    let abilities = AbilityTable::default();
    let mut tree = VoxelTree::new(1).expect("tree");
    let _ = ground(&mut tree, 0, 0, 1, 0);
    let eater = put(&mut tree, VoxelKind::Eater, BLUE, Coordinate::new(0, 0, 0, 2), 8);
    let controller = ActionController::new(eater, &abilities);
    assert_eq!(
        controller.validate(&tree, &Command::Grow),
        ResultCode::NEED_MORE_RESOURCES
    );

    let mut tree = VoxelTree::new(1).expect("tree");
    let eater = put(&mut tree, VoxelKind::Eater, BLUE, Coordinate::new(0, 0, 1, 0), 16);
    let controller = ActionController::new(eater, &abilities);
    assert_eq!(
        controller.validate(&tree, &Command::Grow),
        ResultCode::MAX_WEIGHT
    );
}

#[test]
fn split_without_a_level_neighbour_finds_nothing() {
    let abilities = AbilityTable::default();
    let mut tree = VoxelTree::new(2).expect("tree");
    let _ = ground(&mut tree, 0, 0, 1, 0);
    let _ = ground(&mut tree, 0, 1, 1, 2);
    let eater = put(&mut tree, VoxelKind::Eater, BLUE, Coordinate::new(0, 0, 1, 2), 16);

    let controller = ActionController::new(eater, &abilities);
    let code = controller.validate(&tree, &Command::Split);
    assert_eq!(code, ResultCode::NOT_FOUND);
    assert!(!code.is_hard_fail());
}

#[test]
fn grow_onto_a_lone_friend_lands_on_top_of_it() {
    let abilities = AbilityTable::default();
    let mut tree = VoxelTree::new(2).expect("tree");
    let friend = put(&mut tree, VoxelKind::Eater, BLUE, Coordinate::new(0, 0, 2, 0), 8);
    let eater = put(&mut tree, VoxelKind::Eater, BLUE, Coordinate::new(0, 0, 1, 4), 16);

    let mut controller = ActionController::new(eater, &abilities);
    let (code, effects) = run(&mut tree, &mut controller, Command::Grow);

    assert_eq!(code, ResultCode::SUCCESS);
    assert!(effects.is_empty());
    assert_eq!(tree.coordinate_of(eater), Some(Coordinate::new(0, 0, 2, 4)));
    assert_eq!(tree.below(eater), Some(friend));
}

#[test]
fn diminish_needs_a_surface_and_an_engageable_column() {
    let abilities = AbilityTable::default();
    let mut tree = VoxelTree::new(2).expect("tree");
    let floating = put(&mut tree, VoxelKind::Eater, BLUE, Coordinate::new(0, 0, 1, 2), 8);
    let controller = ActionController::new(floating, &abilities);
    assert_eq!(
        controller.validate(&tree, &Command::Diminish),
        ResultCode::INVALID_LOCATION
    );

    let mut tree = flat_pair();
    let _ = put(&mut tree, VoxelKind::Eater, BLUE, Coordinate::new(0, 0, 1, 2), 8);
    let eater = put(&mut tree, VoxelKind::Eater, BLUE, Coordinate::new(0, 0, 1, 4), 8);
    let controller = ActionController::new(eater, &abilities);
    let code = controller.validate(&tree, &Command::Diminish);
    assert_eq!(code, ResultCode::INVALID_TARGET_LOCATION);
    assert!(!code.is_hard_fail());
}

#[test]
fn convert_swaps_the_record_in_place() {
    let abilities = AbilityTable::default();
    let mut tree = flat_pair();
    let eater = put(&mut tree, VoxelKind::Eater, BLUE, Coordinate::new(0, 0, 1, 2), 8);
    let mut controller = ActionController::new(eater, &abilities);

    let same = Command::Convert {
        kind: VoxelKind::Eater,
    };
    assert_eq!(controller.validate(&tree, &same), ResultCode::INVALID_ARGUMENTS);
    let food = Command::Convert {
        kind: VoxelKind::Eatable,
    };
    assert_eq!(controller.validate(&tree, &food), ResultCode::NOT_SUPPORTED);
    let spawner = Command::Convert {
        kind: VoxelKind::Spawner,
    };
    assert_eq!(controller.validate(&tree, &spawner), ResultCode::MIN_WEIGHT);

    let converted = tree.next_entity_id();
    let (code, effects) = run(
        &mut tree,
        &mut controller,
        Command::Convert {
            kind: VoxelKind::Bomb,
        },
    );

    assert_eq!(code, ResultCode::SUCCESS);
    assert_eq!(
        effects,
        vec![
            Effect::Die { entity: eater },
            Effect::Create {
                entity: converted,
                at: Coordinate::new(0, 0, 1, 2),
            },
        ]
    );
    assert_eq!(controller.entity(), converted);
    let record = tree.record(converted).expect("bomb");
    assert_eq!(record.kind(), VoxelKind::Bomb);
    assert_eq!(record.health(), 4);
    assert!(tree.record(eater).is_none());
}

#[test]
fn spawner_fills_quadrants_in_order() {
    let abilities = AbilityTable::default();
    let mut tree = VoxelTree::new(3).expect("tree");
    let _ = ground(&mut tree, 0, 0, 3, 0);
    let spawner = put(&mut tree, VoxelKind::Spawner, BLUE, Coordinate::new(0, 0, 2, 8), 16);
    let mut controller = ActionController::new(spawner, &abilities);

    let first = tree.next_entity_id();
    let (code, effects) = run(&mut tree, &mut controller, Command::Spawn);
    assert_eq!(code, ResultCode::SUCCESS);
    assert_eq!(
        effects,
        vec![Effect::Create {
            entity: first,
            at: Coordinate::new(0, 0, 0, 12),
        }]
    );

    let second = tree.next_entity_id();
    let (code, effects) = run(&mut tree, &mut controller, Command::Spawn);
    assert_eq!(code, ResultCode::SUCCESS);
    assert_eq!(
        effects,
        vec![Effect::Create {
            entity: second,
            at: Coordinate::new(0, 2, 0, 12),
        }]
    );
    assert_eq!(tree.record(spawner).map(EntityRecord::health), Some(16));
    assert_eq!(tree.record(first).map(EntityRecord::owner), Some(BLUE));

    let eater = ActionController::new(first, &abilities);
    assert_eq!(eater.validate(&tree, &Command::Spawn), ResultCode::NOT_SUPPORTED);
}

#[test]
fn cloned_controllers_only_validate_and_keep_their_own_targeting() {
    let abilities = AbilityTable::default();
    let mut tree = flat_pair();
    let eater = put(&mut tree, VoxelKind::Eater, BLUE, Coordinate::new(0, 0, 1, 2), 8);
    let mut controller = ActionController::new(eater, &abilities);
    let twin = controller.clone();
    let command = step(Coordinate::new(0, 1, 1, 2));
    let before = query::fingerprint(&tree).expect("fingerprint");

    assert_eq!(twin.validate(&tree, &command), ResultCode::SUCCESS);
    assert_eq!(query::fingerprint(&tree).expect("fingerprint"), before);

    let (code, _) = run(&mut tree, &mut controller, command);
    assert_eq!(code, ResultCode::SUCCESS);
    assert!(controller.targeting().last_destination.is_some());
    assert_eq!(twin.targeting().last_destination, None);
    assert_eq!(
        twin.duration_of(&tree, &Command::Split),
        std::time::Duration::from_millis(1_000)
    );
}

#[test]
fn spawner_with_every_quadrant_taken_finds_nothing() {
    let abilities = AbilityTable::default();
    let mut tree = VoxelTree::new(3).expect("tree");
    let _ = ground(&mut tree, 0, 0, 3, 0);
    let spawner = put(&mut tree, VoxelKind::Spawner, BLUE, Coordinate::new(0, 0, 2, 8), 16);
    for (row, col) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
        let _ = put(
            &mut tree,
            VoxelKind::Eatable,
            Owner::NEUTRAL,
            Coordinate::new(row, col, 1, 12),
            1,
        );
    }

    let controller = ActionController::new(spawner, &abilities);
    assert_eq!(controller.validate(&tree, &Command::Spawn), ResultCode::NOT_FOUND);
}

#[test]
fn spawning_costs_health() {
    let abilities = AbilityTable::from_toml_str(
        r#"
        [spawner]
        min_weight = 2
        max_weight = 6
        default_health = 16
        max_health = 16
        spawn_kind = "eater"
        spawn_health_cost = 4
        "#,
    )
    .expect("abilities");
    let mut tree = VoxelTree::new(3).expect("tree");
    let _ = ground(&mut tree, 0, 0, 3, 0);
    let spawner = put(&mut tree, VoxelKind::Spawner, BLUE, Coordinate::new(0, 0, 2, 8), 4);

    let mut controller = ActionController::new(spawner, &abilities);
    let (code, effects) = run(&mut tree, &mut controller, Command::Spawn);
    assert_eq!(code, ResultCode::NEED_MORE_RESOURCES);
    assert!(effects.is_empty());

    tree.record_mut(spawner)
        .expect("spawner")
        .set_health(16)
        .expect("health");
    let (code, effects) = run(&mut tree, &mut controller, Command::Spawn);
    assert_eq!(code, ResultCode::SUCCESS);
    assert_eq!(effects.len(), 1);
    assert_eq!(tree.record(spawner).map(EntityRecord::health), Some(12));
}
