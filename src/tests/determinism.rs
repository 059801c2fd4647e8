//! Checks that a scene of falling hinge chains produces bit-identical results across runs.

use super::DT;
use crate::{math::PI, prelude::*};

const CHAIN_COUNT: usize = 4;
const LINKS_PER_CHAIN: usize = 6;
const STEP_COUNT: usize = 240;

fn build_scene(worker_count: usize) -> (World, Vec<BodyId>) {
    let mut world = World::new(WorldDef {
        worker_count,
        ..Default::default()
    });

    let ground = world.create_body(&BodyDef::fixed(Vector::ZERO)).unwrap();
    world
        .create_capsule_shape(ground, &ShapeDef::default(), Vector::new(-20.0, 0.0), Vector::new(20.0, 0.0), 0.2)
        .unwrap();

    let link_shape = ShapeDef {
        friction: 0.6,
        ..Default::default()
    };

    let mut bodies = Vec::new();
    for chain in 0..CHAIN_COUNT {
        let origin = Vector::new(4.0 * chain as Scalar - 6.0, 4.0 + chain as Scalar);
        let mut previous: Option<BodyId> = None;

        for link in 0..LINKS_PER_CHAIN {
            let position = origin + Vector::new(link as Scalar, 0.1 * link as Scalar);
            let body = world
                .create_body(&BodyDef {
                    rotation: Rotation::radians(0.1 * link as Scalar),
                    ..BodyDef::dynamic(position)
                })
                .unwrap();
            world
                .create_capsule_shape(body, &link_shape, Vector::new(-0.5, 0.0), Vector::new(0.5, 0.0), 0.125)
                .unwrap();

            if let Some(previous) = previous {
                world
                    .create_revolute_joint(&RevoluteJointDef {
                        enable_limit: true,
                        lower_angle: -0.1 * PI,
                        upper_angle: 0.2 * PI,
                        ..RevoluteJointDef::new(previous, body, Vector::new(0.5, 0.0), Vector::new(-0.5, 0.0))
                    })
                    .unwrap();
            }

            previous = Some(body);
            bodies.push(body);
        }
    }

    (world, bodies)
}

/// Hashes the bit patterns of every body transform with djb2.
fn hash_transforms(world: &World, bodies: &[BodyId]) -> u32 {
    let mut hash: u32 = 5381;
    for &body in bodies {
        let transform = world.body_transform(body).unwrap();
        let values = [
            transform.position.x,
            transform.position.y,
            transform.rotation.cos,
            transform.rotation.sin,
        ];
        for value in values {
            for byte in value.to_bits().to_le_bytes() {
                hash = (hash << 5).wrapping_add(hash).wrapping_add(byte as u32);
            }
        }
    }
    hash
}

fn simulate(worker_count: usize) -> (u32, usize) {
    let (mut world, bodies) = build_scene(worker_count);

    let mut sleep_step = STEP_COUNT;
    for step in 0..STEP_COUNT {
        world.step(DT, 4, 2).unwrap();
        if sleep_step == STEP_COUNT && world.counters().awake_island_count == 0 {
            sleep_step = step;
        }
    }

    world.validate();
    (hash_transforms(&world, &bodies), sleep_step)
}

#[test]
fn falling_hinges_are_deterministic() {
    let first = simulate(1);
    let second = simulate(1);
    assert_eq!(first, second);
}

#[cfg(feature = "parallel")]
#[test]
fn falling_hinges_match_across_worker_counts() {
    assert_eq!(simulate(1), simulate(4));
}
