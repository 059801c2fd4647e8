//! Rigid bodies and their mass properties.

use crate::{
    collision::shape::Shape,
    data_structures::{edge_list::EdgeList, pool::Pool},
    dynamics::solver::islands::{IslandMember, IslandNode},
    math::{Rotation, Scalar, Transform, Vector, cross_sv},
};

/// The type of a rigid body.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum BodyType {
    /// Static bodies have zero velocity and infinite mass. They can only be moved
    /// by setting their transform.
    ///
    /// Collisions with static bodies affect dynamic bodies, but not other static or kinematic bodies.
    #[default]
    Static,
    /// Kinematic bodies move according to their velocity and are not affected by forces or collisions.
    ///
    /// They push dynamic bodies as if they had infinite mass.
    Kinematic,
    /// Dynamic bodies are affected by gravity, forces, joints, and collisions.
    Dynamic,
}

impl BodyType {
    /// Returns `true` if the body is dynamic.
    #[inline]
    pub fn is_dynamic(self) -> bool {
        self == Self::Dynamic
    }

    /// Returns `true` if the body is static.
    #[inline]
    pub fn is_static(self) -> bool {
        self == Self::Static
    }

    /// Returns `true` if the body is kinematic.
    #[inline]
    pub fn is_kinematic(self) -> bool {
        self == Self::Kinematic
    }
}

/// Parameters for creating a rigid body.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct BodyDef {
    /// The body type.
    pub body_type: BodyType,
    /// The world position of the body origin.
    pub position: Vector,
    /// The world rotation of the body.
    pub rotation: Rotation,
    /// The initial linear velocity of the body origin.
    pub linear_velocity: Vector,
    /// The initial angular velocity in radians per second.
    pub angular_velocity: Scalar,
    /// Reduces the linear velocity over time.
    pub linear_damping: Scalar,
    /// Reduces the angular velocity over time.
    pub angular_damping: Scalar,
    /// Scales the gravity applied to this body.
    pub gravity_scale: Scalar,
    /// Whether the body is allowed to fall asleep.
    pub enable_sleep: bool,
    /// Whether the body starts awake.
    pub is_awake: bool,
    /// Whether the body starts enabled. Disabled bodies are not simulated.
    pub is_enabled: bool,
}

impl Default for BodyDef {
    fn default() -> Self {
        Self {
            body_type: BodyType::Static,
            position: Vector::ZERO,
            rotation: Rotation::IDENTITY,
            linear_velocity: Vector::ZERO,
            angular_velocity: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            gravity_scale: 1.0,
            enable_sleep: true,
            is_awake: true,
            is_enabled: true,
        }
    }
}

impl BodyDef {
    /// Returns a definition for a dynamic body at the given position.
    pub fn dynamic(position: Vector) -> Self {
        Self {
            body_type: BodyType::Dynamic,
            position,
            ..Default::default()
        }
    }

    /// Returns a definition for a static body at the given position.
    pub fn fixed(position: Vector) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Returns a definition for a kinematic body at the given position.
    pub fn kinematic(position: Vector) -> Self {
        Self {
            body_type: BodyType::Kinematic,
            position,
            ..Default::default()
        }
    }
}

/// A rigid body stored in the world's body pool.
#[derive(Clone, Debug)]
pub(crate) struct Body {
    pub body_type: BodyType,
    /// The transform of the body origin.
    pub transform: Transform,
    /// The world-space center of mass.
    pub center: Vector,
    /// The center of mass relative to the body origin.
    pub local_center: Vector,
    /// The linear velocity of the center of mass.
    pub linear_velocity: Vector,
    pub angular_velocity: Scalar,
    pub force: Vector,
    pub torque: Scalar,
    pub mass: Scalar,
    pub inv_mass: Scalar,
    /// The rotational inertia about the center of mass.
    pub inertia: Scalar,
    pub inv_inertia: Scalar,
    pub linear_damping: Scalar,
    pub angular_damping: Scalar,
    pub gravity_scale: Scalar,
    pub sleep_time: Scalar,
    pub enable_sleep: bool,
    pub is_enabled: bool,
    pub is_awake: bool,
    pub shapes: Vec<u32>,
    pub joints: EdgeList,
    pub contacts: EdgeList,
    pub island: Option<IslandNode>,
}

impl Body {
    pub fn new(def: &BodyDef) -> Self {
        let transform = Transform::new(def.position, def.rotation);
        let is_static = def.body_type.is_static();
        Self {
            body_type: def.body_type,
            transform,
            center: def.position,
            local_center: Vector::ZERO,
            linear_velocity: if is_static {
                Vector::ZERO
            } else {
                def.linear_velocity
            },
            angular_velocity: if is_static { 0.0 } else { def.angular_velocity },
            force: Vector::ZERO,
            torque: 0.0,
            mass: 0.0,
            inv_mass: 0.0,
            inertia: 0.0,
            inv_inertia: 0.0,
            linear_damping: def.linear_damping,
            angular_damping: def.angular_damping,
            gravity_scale: def.gravity_scale,
            sleep_time: 0.0,
            enable_sleep: def.enable_sleep,
            is_enabled: def.is_enabled,
            // Static bodies never simulate, and kinematic bodies never sleep.
            is_awake: !is_static && (def.is_awake || def.body_type.is_kinematic()),
            shapes: Vec::new(),
            joints: EdgeList::default(),
            contacts: EdgeList::default(),
            island: None,
        }
    }

    /// Recomputes the mass, center of mass, and rotational inertia from the attached shapes.
    ///
    /// Static and kinematic bodies have zero mass. The velocity of the center of mass is
    /// adjusted so that the motion of the body origin is preserved.
    pub fn update_mass(&mut self, shapes: &Pool<Shape>) {
        self.mass = 0.0;
        self.inv_mass = 0.0;
        self.inertia = 0.0;
        self.inv_inertia = 0.0;
        self.local_center = Vector::ZERO;

        if !self.body_type.is_dynamic() {
            self.center = self.transform.position;
            return;
        }

        // Accumulate the mass and the inertia about the body origin.
        let mut rotational_inertia = 0.0;
        let mut local_center = Vector::ZERO;
        for &shape_index in &self.shapes {
            let Some(shape) = shapes.get(shape_index) else {
                continue;
            };
            if shape.density == 0.0 {
                continue;
            }
            let mass_data = shape.geometry.compute_mass(shape.density);
            self.mass += mass_data.mass;
            local_center += mass_data.mass * mass_data.center;
            rotational_inertia +=
                mass_data.rotational_inertia + mass_data.mass * mass_data.center.length_squared();
        }

        if self.mass > 0.0 {
            self.inv_mass = 1.0 / self.mass;
            local_center *= self.inv_mass;
        }

        if rotational_inertia > 0.0 {
            // Shift the inertia to the center of mass.
            self.inertia = rotational_inertia - self.mass * local_center.length_squared();
            debug_assert!(self.inertia > 0.0);
            self.inv_inertia = 1.0 / self.inertia;
        }

        let old_center = self.center;
        self.local_center = local_center;
        self.center = self.transform.transform_point(local_center);

        // Keep the velocity of the body origin.
        self.linear_velocity += cross_sv(self.angular_velocity, self.center - old_center);
    }

    /// Sets the transform of the body origin and updates the center of mass.
    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
        self.center = transform.transform_point(self.local_center);
    }

    /// Resets the sleep timer and marks the body awake.
    #[inline]
    pub fn wake(&mut self) {
        if !self.body_type.is_static() {
            self.is_awake = true;
            self.sleep_time = 0.0;
        }
    }

    /// Returns `true` if the body takes part in the simulation this step.
    #[inline]
    pub fn is_simulated(&self) -> bool {
        self.is_enabled && self.is_awake && !self.body_type.is_static()
    }
}

impl IslandMember for Body {
    #[inline]
    fn island(&self) -> Option<&IslandNode> {
        self.island.as_ref()
    }

    #[inline]
    fn island_mut(&mut self) -> &mut Option<IslandNode> {
        &mut self.island
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::shape::{ShapeDef, ShapeGeometry};
    use approx::assert_relative_eq;

    #[test]
    fn offset_circle_moves_center_of_mass() {
        let mut shapes = Pool::default();
        let mut body = Body::new(&BodyDef::dynamic(Vector::new(1.0, 2.0)));

        let geometry = ShapeGeometry::Circle {
            center: Vector::new(1.0, 0.0),
            radius: 0.5,
        };
        let (index, _) = shapes.alloc(Shape::new(0, &ShapeDef::default(), geometry, &body.transform));
        body.shapes.push(index);
        body.update_mass(&shapes);

        let expected_mass = crate::math::PI * 0.25;
        assert_relative_eq!(body.mass, expected_mass);
        assert_relative_eq!(body.inertia, expected_mass * 0.125, epsilon = 1e-5);
        assert_eq!(body.local_center, Vector::new(1.0, 0.0));
        assert_eq!(body.center, Vector::new(2.0, 2.0));
    }

    #[test]
    fn static_bodies_have_no_mass() {
        let mut shapes = Pool::default();
        let mut body = Body::new(&BodyDef::fixed(Vector::ZERO));
        let (index, _) = shapes.alloc(Shape::new(
            0,
            &ShapeDef::default(),
            ShapeGeometry::circle(1.0),
            &body.transform,
        ));
        body.shapes.push(index);
        body.update_mass(&shapes);

        assert_eq!(body.mass, 0.0);
        assert_eq!(body.inv_mass, 0.0);
        assert!(!body.is_awake);
    }
}
