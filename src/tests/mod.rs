use core::cell::Cell;
use std::rc::Rc;

use approx::assert_relative_eq;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    dynamics::solver::constraint_graph::GRAPH_COLOR_COUNT,
    math::{PI, Scalar, Vector},
    prelude::*,
};

mod determinism;

const DT: Scalar = 1.0 / 60.0;

fn create_world(gravity: Vector) -> World {
    World::new(WorldDef {
        gravity,
        ..Default::default()
    })
}

fn step(world: &mut World, steps: usize) {
    for _ in 0..steps {
        world.step(DT, 4, 2).unwrap();
    }
}

fn ball(world: &mut World, position: Vector, radius: Scalar) -> (BodyId, ShapeId) {
    let body = world.create_body(&BodyDef::dynamic(position)).unwrap();
    let shape = world
        .create_circle_shape(body, &ShapeDef::default(), Vector::ZERO, radius)
        .unwrap();
    (body, shape)
}

fn ground(world: &mut World, position: Vector) -> BodyId {
    world.create_body(&BodyDef::fixed(position)).unwrap()
}

fn island_of(world: &World, body: BodyId) -> Option<u32> {
    world
        .state
        .bodies
        .get(body.index)
        .and_then(|body| body.island)
        .map(|node| node.island_id)
}

/// Checks that no two constraints in a regular graph color share a non-static body.
fn assert_colors_disjoint(world: &World) {
    let state = &world.state;
    for color in &state.graph.colors[..GRAPH_COLOR_COUNT] {
        let mut bodies = Vec::new();
        let joint_bodies = color.joints.iter().map(|&index| {
            let joint = state.joints.get(index).unwrap();
            (joint.body_a(), joint.body_b())
        });
        let contact_bodies = color.contacts.iter().map(|&index| {
            let contact = state.contacts.get(index).unwrap();
            (contact.body_a(), contact.body_b())
        });

        for (a, b) in joint_bodies.chain(contact_bodies) {
            for body_index in [a, b] {
                if state.bodies.get(body_index).unwrap().body_type.is_static() {
                    continue;
                }
                assert!(!bodies.contains(&body_index), "body {body_index} is shared within a color");
                bodies.push(body_index);
            }
        }
    }
}

#[derive(Default)]
struct DrawRecorder {
    segments: usize,
    points: usize,
    strings: usize,
}

impl DebugDraw for DrawRecorder {
    fn draw_segment(&mut self, _a: Vector, _b: Vector, _color: HexColor) {
        self.segments += 1;
    }

    fn draw_point(&mut self, _point: Vector, _size: Scalar, _color: HexColor) {
        self.points += 1;
    }

    fn draw_string(&mut self, _position: Vector, _text: &str) {
        self.strings += 1;
    }
}

#[test]
fn random_create_and_destroy_keeps_joint_lists_and_colors_consistent() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut world = create_world(Vector::ZERO);
    let mut bodies: Vec<BodyId> = Vec::new();
    let mut joints: Vec<JointId> = Vec::new();

    for _ in 0..500 {
        match rng.random_range(0..10) {
            0..=2 => {
                let position = Vector::new(rng.random_range(-20.0..20.0), rng.random_range(-20.0..20.0));
                let def = if rng.random_bool(0.2) {
                    BodyDef::fixed(position)
                } else {
                    BodyDef::dynamic(position)
                };
                let body = world.create_body(&def).unwrap();
                world
                    .create_circle_shape(body, &ShapeDef::default(), Vector::ZERO, 0.5)
                    .unwrap();
                bodies.push(body);
            }
            3..=5 if bodies.len() >= 2 => {
                let i = rng.random_range(0..bodies.len());
                let mut j = rng.random_range(0..bodies.len() - 1);
                if j >= i {
                    j += 1;
                }
                let joint = if rng.random_bool(0.5) {
                    world.create_joint(RevoluteJointDef::new(bodies[i], bodies[j], Vector::ZERO, Vector::ZERO))
                } else {
                    world.create_joint(DistanceJointDef::new(bodies[i], bodies[j]))
                };
                joints.push(joint.unwrap());
            }
            6 if !joints.is_empty() => {
                let joint = joints.swap_remove(rng.random_range(0..joints.len()));
                world.destroy_joint(joint).unwrap();
                assert!(!world.is_joint_valid(joint));
            }
            7 if !bodies.is_empty() => {
                let body = bodies.swap_remove(rng.random_range(0..bodies.len()));
                world.destroy_body(body).unwrap();
                joints.retain(|&joint| world.is_joint_valid(joint));
            }
            _ => world.step(DT, 4, 2).unwrap(),
        }

        world.validate();
        assert_colors_disjoint(&world);

        for &body in &bodies {
            let expected = joints
                .iter()
                .filter(|&&joint| {
                    world.joint_body_a(joint).unwrap() == body || world.joint_body_b(joint).unwrap() == body
                })
                .count();
            assert_eq!(world.body_joint_count(body).unwrap(), expected);
            assert_eq!(world.body_joints(body).unwrap().len(), expected);
        }
    }
}

#[test]
fn stale_handles_are_rejected_after_slot_reuse() {
    let mut world = create_world(Vector::ZERO);

    let old = world.create_body(&BodyDef::dynamic(Vector::ZERO)).unwrap();
    world.destroy_body(old).unwrap();
    let new = world.create_body(&BodyDef::dynamic(Vector::ZERO)).unwrap();

    assert_eq!(old.index, new.index);
    assert_ne!(old.revision, new.revision);
    assert!(!world.is_body_valid(old));
    assert!(world.is_body_valid(new));
    assert_eq!(world.body_position(old), Err(WorldError::InvalidBody(old)));
    assert_eq!(world.destroy_body(old), Err(WorldError::InvalidBody(old)));

    // Handles from another world are rejected too.
    let mut other = create_world(Vector::ZERO);
    let foreign = other.create_body(&BodyDef::dynamic(Vector::ZERO)).unwrap();
    assert!(!world.is_body_valid(foreign));

    let ground = ground(&mut world, Vector::ZERO);
    let joint = world
        .create_joint(WeldJointDef::new(ground, new, Vector::ZERO, Vector::ZERO))
        .unwrap();
    world.destroy_joint(joint).unwrap();
    assert_eq!(world.destroy_joint(joint), Err(WorldError::InvalidJoint(joint)));
    assert_eq!(
        world.create_joint(WeldJointDef::new(ground, old, Vector::ZERO, Vector::ZERO)),
        Err(WorldError::InvalidBody(old))
    );
}

#[test]
fn joint_between_a_body_and_itself_is_rejected() {
    let mut world = create_world(Vector::ZERO);
    let (body, _) = ball(&mut world, Vector::ZERO, 0.5);

    assert_eq!(
        world.create_joint(RevoluteJointDef::new(body, body, Vector::ZERO, Vector::ZERO)),
        Err(WorldError::SameBody)
    );
    assert_eq!(world.body_joint_count(body), Ok(0));
}

#[test]
fn stiffness_of_two_bodies() {
    let mut world = create_world(Vector::ZERO);

    // A unit circle with this density has a mass of 2 and a rotational inertia of 1.
    let def = ShapeDef {
        density: 2.0 / PI,
        ..Default::default()
    };
    let a = world.create_body(&BodyDef::dynamic(Vector::ZERO)).unwrap();
    let b = world.create_body(&BodyDef::dynamic(Vector::new(5.0, 0.0))).unwrap();
    world.create_circle_shape(a, &def, Vector::ZERO, 1.0).unwrap();
    world.create_circle_shape(b, &def, Vector::ZERO, 1.0).unwrap();
    assert_relative_eq!(world.body_mass(a).unwrap(), 2.0, epsilon = 1e-5);

    let linear = world.linear_stiffness(1.0, 1.0, a, b).unwrap();
    assert_relative_eq!(linear.stiffness, 39.478, epsilon = 1e-3);
    assert_relative_eq!(linear.damping, 12.566, epsilon = 1e-3);

    let angular = world.angular_stiffness(1.0, 1.0, a, b).unwrap();
    assert_relative_eq!(angular.stiffness, 19.739, epsilon = 1e-3);
    assert_relative_eq!(angular.damping, 6.283, epsilon = 1e-3);

    // A static body contributes no mass.
    let ground = ground(&mut world, Vector::ZERO);
    let anchored = world.linear_stiffness(1.0, 1.0, ground, a).unwrap();
    assert_relative_eq!(anchored.stiffness, 2.0 * 39.478, epsilon = 1e-2);
}

#[test]
fn zero_time_step_does_nothing() {
    let mut world = create_world(Vector::new(0.0, -10.0));
    let body = world
        .create_body(&BodyDef {
            linear_velocity: Vector::new(1.0, 2.0),
            angular_velocity: 0.5,
            ..BodyDef::dynamic(Vector::new(3.0, 4.0))
        })
        .unwrap();
    world
        .create_circle_shape(body, &ShapeDef::default(), Vector::ZERO, 0.5)
        .unwrap();

    world.step(0.0, 4, 2).unwrap();

    assert_eq!(world.body_linear_velocity(body), Ok(Vector::new(1.0, 2.0)));
    assert_eq!(world.body_angular_velocity(body), Ok(0.5));
    assert_eq!(world.body_position(body), Ok(Vector::new(3.0, 4.0)));
    assert_eq!(world.counters(), &Counters::default());
}

#[test]
fn zero_time_step_keeps_joint_state() {
    let mut world = create_world(Vector::new(0.0, -10.0));
    let pivot = ground(&mut world, Vector::new(0.0, 10.0));
    let (bob, _) = ball(&mut world, Vector::new(2.0, 10.0), 0.25);
    let joint = world
        .create_revolute_joint(&RevoluteJointDef::new(pivot, bob, Vector::ZERO, Vector::new(-2.0, 0.0)))
        .unwrap();
    step(&mut world, 10);

    let revolute = *world.joint::<RevoluteJoint>(joint).unwrap();
    let force = world.joint_constraint_force(joint).unwrap();
    let transform = world.body_transform(bob);
    let velocity = world.body_linear_velocity(bob);
    assert_ne!(force, Vector::ZERO);

    world.step(0.0, 4, 2).unwrap();

    assert_eq!(world.joint::<RevoluteJoint>(joint), Ok(&revolute));
    assert_eq!(world.joint_constraint_force(joint), Ok(force));
    assert_eq!(world.body_transform(bob), transform);
    assert_eq!(world.body_linear_velocity(bob), velocity);
}

#[test]
fn joints_without_a_dynamic_body_are_not_solved() {
    let mut world = create_world(Vector::new(0.0, -10.0));
    let fixed = ground(&mut world, Vector::ZERO);
    let platform = world
        .create_body(&BodyDef {
            linear_velocity: Vector::X,
            ..BodyDef::kinematic(Vector::new(2.0, 0.0))
        })
        .unwrap();
    let rider = world.create_body(&BodyDef::kinematic(Vector::new(4.0, 0.0))).unwrap();

    let pinned = world
        .create_revolute_joint(&RevoluteJointDef::new(fixed, platform, Vector::new(2.0, 0.0), Vector::ZERO))
        .unwrap();
    let welded = world
        .create_weld_joint(&WeldJointDef::new(platform, rider, Vector::new(2.0, 0.0), Vector::ZERO))
        .unwrap();

    step(&mut world, 1);

    for joint in [pinned, welded] {
        let record = world.state.joints.get(joint.index).unwrap();
        assert_eq!(record.color_index, None);
        assert!(record.island.is_none());
    }
    assert!(world.counters().color_counts.iter().all(|&count| count == 0));

    // The platform follows its velocity instead of the pin.
    assert_relative_eq!(world.body_position(platform).unwrap().x, 2.0 + DT, epsilon = 1e-5);
    assert_eq!(world.body_position(rider), Ok(Vector::new(4.0, 0.0)));
    world.validate();
}

#[test]
fn disabling_collision_on_a_joint_destroys_contacts() {
    let mut world = create_world(Vector::ZERO);
    let (a, _) = ball(&mut world, Vector::ZERO, 0.5);
    let (b, _) = ball(&mut world, Vector::new(0.5, 0.0), 0.5);

    step(&mut world, 1);
    assert_eq!(world.contact_count_between(a, b), Ok(1));

    let joint = world
        .create_joint(RevoluteJointDef::new(a, b, Vector::new(0.25, 0.0), Vector::new(-0.25, 0.0)))
        .unwrap();
    assert_eq!(world.contact_count_between(a, b), Ok(0));

    // The broad phase does not pair the bodies while the joint forbids it.
    step(&mut world, 1);
    assert_eq!(world.contact_count_between(a, b), Ok(0));

    // Re-enabling does not restore the contacts, the next step does.
    world.set_joint_collide_connected(joint, true).unwrap();
    assert!(world.joint_collide_connected(joint).unwrap());
    assert_eq!(world.contact_count_between(a, b), Ok(0));
    step(&mut world, 1);
    assert_eq!(world.contact_count_between(a, b), Ok(1));

    world.set_joint_collide_connected(joint, false).unwrap();
    assert_eq!(world.contact_count_between(a, b), Ok(0));
    world.validate();
}

#[test]
fn world_is_locked_inside_pre_solve_callback() {
    let mut world = create_world(Vector::ZERO);
    ball(&mut world, Vector::ZERO, 0.5);
    ball(&mut world, Vector::new(0.8, 0.0), 0.5);
    let c = world.create_body(&BodyDef::dynamic(Vector::new(5.0, 5.0))).unwrap();
    let d = world.create_body(&BodyDef::dynamic(Vector::new(6.0, 5.0))).unwrap();
    let tether = world.create_distance_joint(&DistanceJointDef::new(c, d)).unwrap();

    let results = Rc::new(Cell::new(None));
    let seen = Rc::clone(&results);
    world.set_pre_solve_callback(move |world, _, _, _| {
        let create = world.create_body(&BodyDef::default()).err();
        let step = world.step(DT, 4, 2).err();
        let create_joint = world.create_weld_joint(&WeldJointDef::new(c, d, Vector::ZERO, Vector::ZERO)).err();
        let destroy_joint = world.destroy_joint(tether).err();
        seen.set(Some((world.is_locked(), create, step, create_joint, destroy_joint)));
        true
    });

    step(&mut world, 1);

    let locked = Some(WorldError::Locked);
    assert_eq!(results.get(), Some((true, locked, locked, locked, locked)));
    assert!(!world.is_locked());
    assert!(world.is_joint_valid(tether));
    assert_eq!(world.body_joint_count(c), Ok(1));
    assert!(world.create_body(&BodyDef::default()).is_ok());
}

#[test]
fn pre_solve_callback_can_disable_contacts() {
    let mut world = create_world(Vector::ZERO);
    let (a, _) = ball(&mut world, Vector::ZERO, 0.5);
    let (b, _) = ball(&mut world, Vector::new(0.8, 0.0), 0.5);

    world.set_pre_solve_callback(|_, _, _, _| false);
    step(&mut world, 1);

    // The overlap is not resolved.
    assert_eq!(world.body_linear_velocity(a), Ok(Vector::ZERO));
    assert_eq!(world.body_linear_velocity(b), Ok(Vector::ZERO));

    world.clear_pre_solve_callback();
    step(&mut world, 1);
    assert!(world.body_position(a).unwrap().x < 0.0);
    assert!(world.body_position(b).unwrap().x > 0.8);
}

#[test]
fn contact_events_report_begin_and_end_touch() {
    let mut world = create_world(Vector::ZERO);
    let (_, shape_a) = ball(&mut world, Vector::ZERO, 0.5);
    let (b, shape_b) = ball(&mut world, Vector::new(0.9, 0.0), 0.5);

    step(&mut world, 1);
    let events = world.contact_events();
    assert_eq!(events.begin_touch.len(), 1);
    assert!(events.end_touch.is_empty());
    let begin = events.begin_touch[0];
    assert_eq!((begin.shape_a, begin.shape_b), (shape_a, shape_b));

    world
        .set_body_transform(b, Vector::new(10.0, 0.0), Rotation::IDENTITY)
        .unwrap();
    step(&mut world, 1);
    let events = world.contact_events();
    assert!(events.begin_touch.is_empty());
    assert_eq!(events.end_touch.len(), 1);
    assert_eq!(world.counters().contact_count, 0);
}

#[test]
fn islands_merge_and_split() {
    let mut world = create_world(Vector::ZERO);
    let (a, _) = ball(&mut world, Vector::ZERO, 0.5);
    let (b, _) = ball(&mut world, Vector::new(5.0, 0.0), 0.5);
    // Within the speculative distance, so the contact touches without pushing.
    let (c, _) = ball(&mut world, Vector::new(6.01, 0.0), 0.5);

    assert_ne!(island_of(&world, a), island_of(&world, b));

    // A joint merges the islands immediately.
    let joint = world.create_joint(DistanceJointDef {
        length: 5.0,
        ..DistanceJointDef::new(a, b)
    });
    let joint = joint.unwrap();
    assert_eq!(island_of(&world, a), island_of(&world, b));

    // A touching contact merges the islands during the step.
    assert_ne!(island_of(&world, b), island_of(&world, c));
    step(&mut world, 1);
    assert_eq!(island_of(&world, b), island_of(&world, c));

    // Removing the joint leaves a pending split, resolved once the island wants to sleep.
    world.destroy_joint(joint).unwrap();
    assert_eq!(island_of(&world, a), island_of(&world, b));
    step(&mut world, 90);
    world.validate();
    assert_ne!(island_of(&world, a), island_of(&world, b));
    assert_eq!(world.counters().island_count, 2);
}

#[test]
fn resting_bodies_fall_asleep_and_wake_up() {
    let mut world = create_world(Vector::ZERO);
    let (body, _) = ball(&mut world, Vector::ZERO, 0.5);

    step(&mut world, 60);
    assert!(!world.is_body_awake(body).unwrap());
    assert_eq!(world.counters().awake_island_count, 0);

    world.wake_body(body).unwrap();
    assert!(world.is_body_awake(body).unwrap());

    step(&mut world, 60);
    assert!(!world.is_body_awake(body).unwrap());

    // A velocity wakes the body, and it keeps moving.
    world.set_body_linear_velocity(body, Vector::new(1.0, 0.0)).unwrap();
    step(&mut world, 60);
    assert!(world.is_body_awake(body).unwrap());
    assert!(world.body_position(body).unwrap().x > 0.5);

    // Disabling sleep wakes everything and keeps it awake.
    world.set_body_linear_velocity(body, Vector::ZERO).unwrap();
    step(&mut world, 60);
    assert!(!world.is_body_awake(body).unwrap());
    world.enable_sleeping(false).unwrap();
    assert!(world.is_body_awake(body).unwrap());
    step(&mut world, 60);
    assert!(world.is_body_awake(body).unwrap());
}

#[test]
fn body_created_asleep_is_woken_by_a_joint_to_an_awake_body() {
    let mut world = create_world(Vector::ZERO);
    let sleeper = world
        .create_body(&BodyDef {
            is_awake: false,
            ..BodyDef::dynamic(Vector::ZERO)
        })
        .unwrap();
    let (awake, _) = ball(&mut world, Vector::new(2.0, 0.0), 0.5);
    assert!(!world.is_body_awake(sleeper).unwrap());

    world
        .create_joint(DistanceJointDef {
            length: 2.0,
            ..DistanceJointDef::new(sleeper, awake)
        })
        .unwrap();
    assert!(world.is_body_awake(sleeper).unwrap());
    world.validate();
}

#[test]
fn disabled_body_leaves_the_simulation() {
    let mut world = create_world(Vector::ZERO);
    let (a, _) = ball(&mut world, Vector::ZERO, 0.5);
    let (b, _) = ball(&mut world, Vector::new(0.8, 0.0), 0.5);
    let (c, _) = ball(&mut world, Vector::new(3.0, 0.0), 0.5);
    let joint = world
        .create_joint(DistanceJointDef {
            length: 3.0,
            ..DistanceJointDef::new(a, c)
        })
        .unwrap();

    step(&mut world, 1);
    assert_eq!(world.contact_count_between(a, b), Ok(1));

    world.disable_body(a).unwrap();
    let position = world.body_position(a).unwrap();
    assert!(!world.is_body_enabled(a).unwrap());
    assert_eq!(world.contact_count_between(a, b), Ok(0));
    assert!(world.is_joint_valid(joint));
    world.validate();

    step(&mut world, 10);
    assert_eq!(world.body_position(a), Ok(position));
    assert_eq!(world.contact_count_between(a, b), Ok(0));

    world.enable_body(a).unwrap();
    assert!(world.is_body_awake(a).unwrap());
    assert_eq!(island_of(&world, a), island_of(&world, c));
    world.validate();
    step(&mut world, 1);
    world.validate();
}

#[test]
fn joint_list_traversal_visits_every_joint() {
    let mut world = create_world(Vector::ZERO);
    let hub = ground(&mut world, Vector::ZERO);
    let mut created = Vec::new();
    for i in 0..3 {
        let (spoke, _) = ball(&mut world, Vector::new(2.0 * (i + 1) as Scalar, 0.0), 0.5);
        created.push(
            world
                .create_joint(WeldJointDef::new(hub, spoke, Vector::ZERO, Vector::ZERO))
                .unwrap(),
        );
    }

    let mut visited = Vec::new();
    let mut next = world.first_joint(hub).unwrap();
    while let Some(joint) = next {
        visited.push(joint);
        next = world.next_joint(hub, joint).unwrap();
    }

    // New joints are inserted at the head of the list.
    created.reverse();
    assert_eq!(visited, created);
    assert_eq!(world.body_joint_count(hub), Ok(3));
}

#[test]
fn typed_joint_access_checks_the_joint_type() {
    let mut world = create_world(Vector::ZERO);
    let ground = ground(&mut world, Vector::ZERO);
    let (body, _) = ball(&mut world, Vector::new(2.0, 0.0), 0.5);
    let joint = world
        .create_distance_joint(&DistanceJointDef {
            length: 2.0,
            ..DistanceJointDef::new(ground, body)
        })
        .unwrap();

    assert_eq!(world.joint_type(joint), Ok(JointType::Distance));
    assert_eq!(world.joint::<DistanceJoint>(joint).unwrap().length(), 2.0);
    assert_eq!(
        world.joint::<RevoluteJoint>(joint).err(),
        Some(WorldError::JointTypeMismatch {
            expected: JointType::Revolute,
            found: JointType::Distance,
        })
    );

    world.joint_mut::<DistanceJoint>(joint).unwrap().set_length(3.0, 0.0, 10.0);
    assert_eq!(world.joint::<DistanceJoint>(joint).unwrap().length(), 3.0);
    assert_eq!(world.joint_body_a(joint), Ok(ground));
    assert_eq!(world.joint_body_b(joint), Ok(body));
}

#[test]
fn revolute_joint_holds_a_pendulum() {
    let mut world = create_world(Vector::new(0.0, -10.0));
    let pivot = ground(&mut world, Vector::new(0.0, 10.0));
    let (bob, _) = ball(&mut world, Vector::new(2.0, 10.0), 0.25);
    world
        .create_revolute_joint(&RevoluteJointDef::new(pivot, bob, Vector::ZERO, Vector::new(-2.0, 0.0)))
        .unwrap();

    step(&mut world, 120);

    let anchor_b = world.body_world_point(bob, Vector::new(-2.0, 0.0)).unwrap();
    assert!(anchor_b.distance(Vector::new(0.0, 10.0)) < 0.1);
    assert!(world.body_position(bob).unwrap().y < 9.5);
}

#[test]
fn distance_joint_keeps_its_length() {
    let mut world = create_world(Vector::new(0.0, -10.0));
    let pivot = ground(&mut world, Vector::new(0.0, 10.0));
    let bob = world
        .create_body(&BodyDef {
            linear_velocity: Vector::new(3.0, 0.0),
            ..BodyDef::dynamic(Vector::new(0.0, 7.0))
        })
        .unwrap();
    world
        .create_circle_shape(bob, &ShapeDef::default(), Vector::ZERO, 0.25)
        .unwrap();
    let joint = world
        .create_distance_joint(&DistanceJointDef {
            length: 3.0,
            ..DistanceJointDef::new(pivot, bob)
        })
        .unwrap();

    step(&mut world, 120);

    assert_relative_eq!(world.distance_joint_current_length(joint).unwrap(), 3.0, epsilon = 0.1);
}

#[test]
fn weld_joint_holds_a_body_in_place() {
    let mut world = create_world(Vector::new(0.0, -10.0));
    let wall = ground(&mut world, Vector::ZERO);
    let (body, _) = ball(&mut world, Vector::new(1.0, 0.0), 0.25);
    world
        .create_weld_joint(&WeldJointDef::new(wall, body, Vector::new(1.0, 0.0), Vector::ZERO))
        .unwrap();

    step(&mut world, 120);

    assert!(world.body_position(body).unwrap().distance(Vector::new(1.0, 0.0)) < 0.1);
}

#[test]
fn prismatic_joint_allows_motion_along_its_axis_only() {
    let mut world = create_world(Vector::new(0.0, -10.0));
    let rail = ground(&mut world, Vector::ZERO);
    let body = world
        .create_body(&BodyDef {
            linear_velocity: Vector::new(1.0, 0.0),
            ..BodyDef::dynamic(Vector::ZERO)
        })
        .unwrap();
    world
        .create_circle_shape(body, &ShapeDef::default(), Vector::ZERO, 0.25)
        .unwrap();
    let joint = world
        .create_prismatic_joint(&PrismaticJointDef::new(rail, body, Vector::X))
        .unwrap();

    step(&mut world, 60);

    let position = world.body_position(body).unwrap();
    assert!(position.y.abs() < 0.05);
    assert!(position.x > 0.5);
    assert_relative_eq!(world.prismatic_joint_translation(joint).unwrap(), position.x, epsilon = 0.05);
}

#[test]
fn wheel_joint_constrains_motion_to_its_axis() {
    let mut world = create_world(Vector::new(0.0, -10.0));
    let chassis = ground(&mut world, Vector::ZERO);
    let wheel = world
        .create_body(&BodyDef {
            linear_velocity: Vector::new(1.0, 0.0),
            ..BodyDef::dynamic(Vector::ZERO)
        })
        .unwrap();
    world
        .create_circle_shape(wheel, &ShapeDef::default(), Vector::ZERO, 0.25)
        .unwrap();
    world
        .create_wheel_joint(&WheelJointDef::new(chassis, wheel, Vector::ZERO, Vector::Y))
        .unwrap();

    step(&mut world, 60);

    let position = world.body_position(wheel).unwrap();
    assert!(position.x.abs() < 0.05);
    assert!(position.y < -1.0);
}

#[test]
fn motor_joint_drives_a_body_to_its_offset() {
    let mut world = create_world(Vector::ZERO);
    let base = ground(&mut world, Vector::ZERO);
    let (body, _) = ball(&mut world, Vector::ZERO, 0.5);
    world
        .create_motor_joint(&MotorJointDef {
            linear_offset: Vector::new(2.0, 0.0),
            max_force: 1000.0,
            max_torque: 1000.0,
            ..MotorJointDef::new(base, body)
        })
        .unwrap();

    step(&mut world, 120);

    assert!(world.body_position(body).unwrap().distance(Vector::new(2.0, 0.0)) < 0.05);
}

#[test]
fn mouse_joint_pulls_a_body_toward_its_target() {
    let mut world = create_world(Vector::ZERO);
    let base = ground(&mut world, Vector::ZERO);
    let (body, _) = ball(&mut world, Vector::ZERO, 0.5);
    let spring = world.linear_stiffness(5.0, 0.7, base, body).unwrap();
    let mouse = world
        .create_mouse_joint(&MouseJointDef {
            max_force: 1000.0,
            stiffness: spring.stiffness,
            damping: spring.damping,
            ..MouseJointDef::new(base, body, Vector::ZERO)
        })
        .unwrap();

    world
        .joint_mut::<MouseJoint>(mouse)
        .unwrap()
        .set_target(Vector::new(2.0, 0.0));
    step(&mut world, 180);

    assert!(world.body_position(body).unwrap().distance(Vector::new(2.0, 0.0)) < 0.05);
}

#[test]
fn revolute_motor_reaches_its_speed() {
    let mut world = create_world(Vector::ZERO);
    let base = ground(&mut world, Vector::ZERO);
    let (wheel, _) = ball(&mut world, Vector::ZERO, 0.5);
    let joint = world
        .create_revolute_joint(&RevoluteJointDef {
            enable_motor: true,
            motor_speed: 2.0,
            max_motor_torque: 100.0,
            ..RevoluteJointDef::new(base, wheel, Vector::ZERO, Vector::ZERO)
        })
        .unwrap();

    step(&mut world, 60);
    assert_relative_eq!(world.body_angular_velocity(wheel).unwrap(), 2.0, epsilon = 1e-2);

    world.joint_mut::<RevoluteJoint>(joint).unwrap().set_motor_speed(-1.0);
    step(&mut world, 10);
    assert_relative_eq!(world.body_angular_velocity(wheel).unwrap(), -1.0, epsilon = 1e-2);
}

#[test]
fn revolute_limit_stops_a_pendulum() {
    let mut world = create_world(Vector::new(0.0, -10.0));
    let pivot = ground(&mut world, Vector::new(0.0, 10.0));
    let (bob, _) = ball(&mut world, Vector::new(2.0, 10.0), 0.25);
    let joint = world
        .create_revolute_joint(&RevoluteJointDef {
            enable_limit: true,
            lower_angle: -0.25,
            upper_angle: 0.25,
            ..RevoluteJointDef::new(pivot, bob, Vector::ZERO, Vector::new(-2.0, 0.0))
        })
        .unwrap();

    step(&mut world, 120);

    let angle = world.revolute_joint_angle(joint).unwrap();
    assert!(angle > -0.3 && angle < 0.0, "angle {angle} is outside of the limits");
}

#[test]
fn density_change_recomputes_mass() {
    let mut world = create_world(Vector::ZERO);
    let (body, shape) = ball(&mut world, Vector::ZERO, 1.0);
    assert_relative_eq!(world.body_mass(body).unwrap(), PI, epsilon = 1e-5);
    let inertia = world.body_inertia(body).unwrap();

    world.set_shape_density(shape, 2.0).unwrap();
    assert_relative_eq!(world.body_mass(body).unwrap(), 2.0 * PI, epsilon = 1e-5);
    assert_relative_eq!(world.body_inertia(body).unwrap(), 2.0 * inertia, epsilon = 1e-5);

    // An offset shape moves the center of mass.
    world
        .create_circle_shape(body, &ShapeDef { density: 2.0, ..Default::default() }, Vector::new(2.0, 0.0), 1.0)
        .unwrap();
    assert_relative_eq!(world.body_local_center(body).unwrap().x, 1.0, epsilon = 1e-5);

    world.destroy_shape(shape).unwrap();
    assert_relative_eq!(world.body_mass(body).unwrap(), 2.0 * PI, epsilon = 1e-5);
    assert_relative_eq!(world.body_local_center(body).unwrap().x, 2.0, epsilon = 1e-5);
}

#[test]
fn filter_change_removes_contacts() {
    let mut world = create_world(Vector::ZERO);
    let (a, _) = ball(&mut world, Vector::ZERO, 0.5);
    let (b, shape_b) = ball(&mut world, Vector::new(1.01, 0.0), 0.5);

    step(&mut world, 1);
    assert_eq!(world.contact_count_between(a, b), Ok(1));

    let filter = Filter {
        mask_bits: 0,
        ..Filter::DEFAULT
    };
    world.set_shape_filter(shape_b, filter).unwrap();
    assert_eq!(world.shape_filter(shape_b), Ok(filter));
    assert_eq!(world.contact_count_between(a, b), Ok(0));

    step(&mut world, 1);
    assert_eq!(world.contact_count_between(a, b), Ok(0));

    world.set_shape_filter(shape_b, Filter::DEFAULT).unwrap();
    step(&mut world, 1);
    assert_eq!(world.contact_count_between(a, b), Ok(1));
}

#[test]
fn every_joint_type_draws() {
    let mut world = create_world(Vector::ZERO);
    let base = ground(&mut world, Vector::ZERO);
    let (body, _) = ball(&mut world, Vector::new(1.0, 0.0), 0.25);

    let defs: [JointDef; 7] = [
        DistanceJointDef::new(base, body).into(),
        MotorJointDef::new(base, body).into(),
        MouseJointDef::new(base, body, Vector::new(1.0, 0.0)).into(),
        PrismaticJointDef::new(base, body, Vector::X).into(),
        RevoluteJointDef::new(base, body, Vector::new(1.0, 0.0), Vector::ZERO).into(),
        WeldJointDef::new(base, body, Vector::new(1.0, 0.0), Vector::ZERO).into(),
        WheelJointDef::new(base, body, Vector::new(1.0, 0.0), Vector::Y).into(),
    ];

    for def in defs {
        let joint = world.create_joint(def).unwrap();
        assert_eq!(world.joint_type(joint), Ok(def.joint_type()));

        let mut recorder = DrawRecorder::default();
        world.draw(&mut recorder, DebugDrawFlags::JOINTS);
        assert!(recorder.segments > 0, "{:?} joint drew nothing", def.joint_type());

        world.destroy_joint(joint).unwrap();
    }

    // Without joints, only shapes are drawn.
    let mut recorder = DrawRecorder::default();
    world.draw(&mut recorder, DebugDrawFlags::JOINTS);
    assert_eq!(recorder.segments + recorder.points, 0);

    world.draw(&mut recorder, DebugDrawFlags::SHAPES | DebugDrawFlags::MASS);
    assert!(recorder.segments > 0);
    assert_eq!(recorder.strings, 2);
}

#[test]
fn step_records_diagnostics_and_counters() {
    let mut world = create_world(Vector::new(0.0, -10.0));
    let floor = ground(&mut world, Vector::ZERO);
    world
        .create_capsule_shape(floor, &ShapeDef::default(), Vector::new(-5.0, 0.0), Vector::new(5.0, 0.0), 0.1)
        .unwrap();
    for i in 0..4 {
        ball(&mut world, Vector::new(1.5 * i as Scalar - 2.25, 0.6), 0.5);
    }

    step(&mut world, 1);

    let counters = *world.counters();
    assert_eq!(counters.body_count, 5);
    assert_eq!(counters.shape_count, 5);
    assert_eq!(counters.island_count, 4);
    assert!(counters.contact_count >= 4);
    assert_eq!(counters.overflow_count(), 0);
    assert!(counters.color_counts.iter().sum::<usize>() >= 4);

    let diagnostics = world.diagnostics();
    assert!(diagnostics.step >= diagnostics.collide);
    assert_eq!(diagnostics.timer_paths().len(), 14);
}

#[test]
fn balls_come_to_rest_on_the_ground() {
    let mut world = create_world(Vector::new(0.0, -10.0));
    let floor = ground(&mut world, Vector::ZERO);
    world
        .create_capsule_shape(floor, &ShapeDef::default(), Vector::new(-10.0, 0.0), Vector::new(10.0, 0.0), 0.1)
        .unwrap();
    let balls: Vec<BodyId> = (0..5)
        .map(|i| ball(&mut world, Vector::new(1.5 * i as Scalar - 3.0, 2.0 + i as Scalar), 0.5).0)
        .collect();

    step(&mut world, 300);

    for body in balls {
        let position = world.body_position(body).unwrap();
        assert!(position.y > 0.5 && position.y < 0.7, "ball at {position} is not resting on the ground");
        assert!(!world.is_body_awake(body).unwrap());
    }
    world.validate();
}
