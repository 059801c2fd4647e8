use bevy_log::debug;

use crate::{
    data_structures::edge_list::iter_edges,
    dynamics::rigid_body::{Body, BodyDef, BodyType},
    error::WorldError,
    id::{BodyId, JointId},
    math::{Rotation, Scalar, Transform, Vector, cross},
};

use super::World;

impl World {
    /// Creates a rigid body. Shapes are attached separately.
    pub fn create_body(&mut self, def: &BodyDef) -> Result<BodyId, WorldError> {
        self.check_unlocked()?;

        let state = &mut self.state;
        let (body_index, revision) = state.bodies.alloc(Body::new(def));

        if def.body_type.is_dynamic() && def.is_enabled {
            let island_id = state.islands.create_island_for_body(&mut state.bodies, body_index);
            if !def.is_awake {
                state.islands.sleep_island(
                    island_id,
                    &mut state.bodies,
                    &mut state.contacts,
                    &mut state.joints,
                    &mut state.graph,
                );
            }
        }

        Ok(BodyId::new(body_index, state.world_index, revision))
    }

    /// Destroys a body along with its joints, contacts, and shapes.
    pub fn destroy_body(&mut self, id: BodyId) -> Result<(), WorldError> {
        self.check_unlocked()?;
        let body_index = self.body_index(id)?;
        let state = &mut self.state;

        let Some(body) = state.bodies.get(body_index) else {
            return Err(WorldError::InvalidBody(id));
        };
        let joint_indices: Vec<u32> = iter_edges(&state.joints, body.joints).map(|key| key.index).collect();
        let shape_indices = body.shapes.clone();

        for joint_index in joint_indices {
            state.destroy_joint(joint_index, true);
        }

        state.destroy_body_contacts(body_index, true);

        for shape_index in shape_indices {
            state.broad_phase.remove_proxy(shape_index);
            state.shapes.free(shape_index);
        }

        state.islands.remove_body(&mut state.bodies, body_index);
        state.bodies.free(body_index);

        Ok(())
    }

    pub(crate) fn body(&self, id: BodyId) -> Result<&Body, WorldError> {
        let body_index = self.body_index(id)?;
        self.state.bodies.get(body_index).ok_or(WorldError::InvalidBody(id))
    }

    pub(crate) fn body_mut(&mut self, id: BodyId) -> Result<&mut Body, WorldError> {
        let body_index = self.body_index(id)?;
        self.state
            .bodies
            .get_mut(body_index)
            .ok_or(WorldError::InvalidBody(id))
    }

    pub fn body_type(&self, id: BodyId) -> Result<BodyType, WorldError> {
        Ok(self.body(id)?.body_type)
    }

    /// Returns the world position of the body origin.
    pub fn body_position(&self, id: BodyId) -> Result<Vector, WorldError> {
        Ok(self.body(id)?.transform.position)
    }

    pub fn body_rotation(&self, id: BodyId) -> Result<Rotation, WorldError> {
        Ok(self.body(id)?.transform.rotation)
    }

    pub fn body_transform(&self, id: BodyId) -> Result<Transform, WorldError> {
        Ok(self.body(id)?.transform)
    }

    /// Teleports the body origin. Contacts are updated on the next step.
    pub fn set_body_transform(&mut self, id: BodyId, position: Vector, rotation: Rotation) -> Result<(), WorldError> {
        self.check_unlocked()?;
        let body_index = self.body_index(id)?;
        let state = &mut self.state;

        let Some(body) = state.bodies.get_mut(body_index) else {
            return Err(WorldError::InvalidBody(id));
        };
        body.set_transform(Transform::new(position, rotation.normalize()));

        for &shape_index in &body.shapes {
            if let Some(shape) = state.shapes.get_mut(shape_index) {
                shape.update_aabb(&body.transform);
            }
        }

        Ok(())
    }

    /// Returns the world position of the center of mass.
    pub fn body_world_center(&self, id: BodyId) -> Result<Vector, WorldError> {
        Ok(self.body(id)?.center)
    }

    /// Returns the center of mass in the local space of the body.
    pub fn body_local_center(&self, id: BodyId) -> Result<Vector, WorldError> {
        Ok(self.body(id)?.local_center)
    }

    /// Converts a world point into the local space of the body.
    pub fn body_local_point(&self, id: BodyId, world_point: Vector) -> Result<Vector, WorldError> {
        Ok(self.body(id)?.transform.inverse_transform_point(world_point))
    }

    /// Converts a local point of the body into world space.
    pub fn body_world_point(&self, id: BodyId, local_point: Vector) -> Result<Vector, WorldError> {
        Ok(self.body(id)?.transform.transform_point(local_point))
    }

    /// Returns the linear velocity of the center of mass.
    pub fn body_linear_velocity(&self, id: BodyId) -> Result<Vector, WorldError> {
        Ok(self.body(id)?.linear_velocity)
    }

    pub fn body_angular_velocity(&self, id: BodyId) -> Result<Scalar, WorldError> {
        Ok(self.body(id)?.angular_velocity)
    }

    /// Sets the linear velocity of the center of mass. A non-zero velocity wakes the body.
    pub fn set_body_linear_velocity(&mut self, id: BodyId, velocity: Vector) -> Result<(), WorldError> {
        let body_index = self.body_index(id)?;
        if self.body(id)?.body_type.is_static() {
            return Ok(());
        }
        if velocity.length_squared() > 0.0 {
            self.state.wake_body(body_index);
        }
        self.body_mut(id)?.linear_velocity = velocity;
        Ok(())
    }

    /// Sets the angular velocity. A non-zero velocity wakes the body.
    pub fn set_body_angular_velocity(&mut self, id: BodyId, velocity: Scalar) -> Result<(), WorldError> {
        let body_index = self.body_index(id)?;
        if self.body(id)?.body_type.is_static() {
            return Ok(());
        }
        if velocity != 0.0 {
            self.state.wake_body(body_index);
        }
        self.body_mut(id)?.angular_velocity = velocity;
        Ok(())
    }

    /// Wakes the body if requested, and returns it if it is awake and dynamic.
    fn awake_dynamic_body(&mut self, id: BodyId, wake: bool) -> Result<Option<&mut Body>, WorldError> {
        let body_index = self.body_index(id)?;
        if wake {
            self.state.wake_body(body_index);
        }
        let body = self.body_mut(id)?;
        Ok((body.body_type.is_dynamic() && body.is_awake).then_some(body))
    }

    /// Applies a force at a world point. The force is cleared after the next step.
    ///
    /// Sleeping bodies ignore the force unless `wake` is `true`.
    pub fn apply_force(&mut self, id: BodyId, force: Vector, point: Vector, wake: bool) -> Result<(), WorldError> {
        if let Some(body) = self.awake_dynamic_body(id, wake)? {
            body.force += force;
            body.torque += cross(point - body.center, force);
        }
        Ok(())
    }

    /// Applies a force at the center of mass.
    pub fn apply_force_to_center(&mut self, id: BodyId, force: Vector, wake: bool) -> Result<(), WorldError> {
        if let Some(body) = self.awake_dynamic_body(id, wake)? {
            body.force += force;
        }
        Ok(())
    }

    pub fn apply_torque(&mut self, id: BodyId, torque: Scalar, wake: bool) -> Result<(), WorldError> {
        if let Some(body) = self.awake_dynamic_body(id, wake)? {
            body.torque += torque;
        }
        Ok(())
    }

    /// Applies an impulse at a world point, changing the velocity immediately.
    pub fn apply_linear_impulse(
        &mut self,
        id: BodyId,
        impulse: Vector,
        point: Vector,
        wake: bool,
    ) -> Result<(), WorldError> {
        if let Some(body) = self.awake_dynamic_body(id, wake)? {
            body.linear_velocity += body.inv_mass * impulse;
            body.angular_velocity += body.inv_inertia * cross(point - body.center, impulse);
        }
        Ok(())
    }

    pub fn apply_linear_impulse_to_center(&mut self, id: BodyId, impulse: Vector, wake: bool) -> Result<(), WorldError> {
        if let Some(body) = self.awake_dynamic_body(id, wake)? {
            body.linear_velocity += body.inv_mass * impulse;
        }
        Ok(())
    }

    pub fn apply_angular_impulse(&mut self, id: BodyId, impulse: Scalar, wake: bool) -> Result<(), WorldError> {
        if let Some(body) = self.awake_dynamic_body(id, wake)? {
            body.angular_velocity += body.inv_inertia * impulse;
        }
        Ok(())
    }

    /// Returns the mass of the body, computed from its shapes.
    pub fn body_mass(&self, id: BodyId) -> Result<Scalar, WorldError> {
        Ok(self.body(id)?.mass)
    }

    /// Returns the rotational inertia about the center of mass.
    pub fn body_inertia(&self, id: BodyId) -> Result<Scalar, WorldError> {
        Ok(self.body(id)?.inertia)
    }

    pub fn body_linear_damping(&self, id: BodyId) -> Result<Scalar, WorldError> {
        Ok(self.body(id)?.linear_damping)
    }

    pub fn set_body_linear_damping(&mut self, id: BodyId, damping: Scalar) -> Result<(), WorldError> {
        self.body_mut(id)?.linear_damping = damping.max(0.0);
        Ok(())
    }

    pub fn body_angular_damping(&self, id: BodyId) -> Result<Scalar, WorldError> {
        Ok(self.body(id)?.angular_damping)
    }

    pub fn set_body_angular_damping(&mut self, id: BodyId, damping: Scalar) -> Result<(), WorldError> {
        self.body_mut(id)?.angular_damping = damping.max(0.0);
        Ok(())
    }

    pub fn body_gravity_scale(&self, id: BodyId) -> Result<Scalar, WorldError> {
        Ok(self.body(id)?.gravity_scale)
    }

    pub fn set_body_gravity_scale(&mut self, id: BodyId, scale: Scalar) -> Result<(), WorldError> {
        self.body_mut(id)?.gravity_scale = scale;
        Ok(())
    }

    pub fn is_body_awake(&self, id: BodyId) -> Result<bool, WorldError> {
        Ok(self.body(id)?.is_awake)
    }

    /// Wakes the body and the island it belongs to.
    pub fn wake_body(&mut self, id: BodyId) -> Result<(), WorldError> {
        self.check_unlocked()?;
        let body_index = self.body_index(id)?;
        self.state.wake_body(body_index);
        Ok(())
    }

    /// Allows or prevents the body from falling asleep.
    pub fn enable_body_sleep(&mut self, id: BodyId, enable: bool) -> Result<(), WorldError> {
        self.check_unlocked()?;
        let body_index = self.body_index(id)?;
        self.body_mut(id)?.enable_sleep = enable;
        if !enable {
            self.state.wake_body(body_index);
        }
        Ok(())
    }

    pub fn is_body_enabled(&self, id: BodyId) -> Result<bool, WorldError> {
        Ok(self.body(id)?.is_enabled)
    }

    /// Removes the body from the simulation without destroying it.
    ///
    /// Its contacts are destroyed, its shapes leave the broad phase, and its joints stop acting.
    pub fn disable_body(&mut self, id: BodyId) -> Result<(), WorldError> {
        self.check_unlocked()?;
        let body_index = self.body_index(id)?;
        if !self.body(id)?.is_enabled {
            return Ok(());
        }

        let state = &mut self.state;
        state.destroy_body_contacts(body_index, false);

        let Some(body) = state.bodies.get(body_index) else {
            return Err(WorldError::InvalidBody(id));
        };
        let joint_indices: Vec<u32> = iter_edges(&state.joints, body.joints).map(|key| key.index).collect();
        let shape_indices = body.shapes.clone();

        for joint_index in joint_indices {
            state.unlink_joint(joint_index);
        }
        for shape_index in shape_indices {
            state.broad_phase.remove_proxy(shape_index);
        }

        state.islands.remove_body(&mut state.bodies, body_index);

        if let Some(body) = state.bodies.get_mut(body_index) {
            body.is_enabled = false;
            body.is_awake = false;
            body.sleep_time = 0.0;
        }

        debug!("disabled body {body_index}");
        Ok(())
    }

    /// Returns a disabled body to the simulation. It starts out awake.
    pub fn enable_body(&mut self, id: BodyId) -> Result<(), WorldError> {
        self.check_unlocked()?;
        let body_index = self.body_index(id)?;
        if self.body(id)?.is_enabled {
            return Ok(());
        }

        let state = &mut self.state;
        let Some(body) = state.bodies.get_mut(body_index) else {
            return Err(WorldError::InvalidBody(id));
        };
        body.is_enabled = true;
        body.is_awake = !body.body_type.is_static();
        body.sleep_time = 0.0;
        let is_dynamic = body.body_type.is_dynamic();
        let joints = body.joints;
        let shape_indices = body.shapes.clone();

        if is_dynamic {
            state.islands.create_island_for_body(&mut state.bodies, body_index);
        }

        for shape_index in shape_indices {
            state.create_proxy(shape_index);
        }

        let joint_indices: Vec<u32> = iter_edges(&state.joints, joints).map(|key| key.index).collect();
        for joint_index in joint_indices {
            state.link_joint(joint_index);
        }

        debug!("enabled body {body_index}");
        Ok(())
    }

    /// Returns the first joint in the joint list of the body.
    pub fn first_joint(&self, id: BodyId) -> Result<Option<JointId>, WorldError> {
        let body = self.body(id)?;
        Ok(body.joints.head.map(|key| self.state.joint_id(key.index)))
    }

    /// Returns the joint after `joint` in the joint list of the body.
    pub fn next_joint(&self, id: BodyId, joint: JointId) -> Result<Option<JointId>, WorldError> {
        let body_index = self.body_index(id)?;
        let joint_index = self.joint_index(joint)?;
        let joint = self
            .state
            .joints
            .get(joint_index)
            .ok_or(WorldError::InvalidJoint(joint))?;

        let edge = joint
            .edges
            .iter()
            .find(|edge| edge.body_index == body_index)
            .ok_or(WorldError::InvalidBody(id))?;
        Ok(edge.next_key.map(|key| self.state.joint_id(key.index)))
    }

    /// Returns the joints attached to the body, most recently created first.
    pub fn body_joints(&self, id: BodyId) -> Result<Vec<JointId>, WorldError> {
        let body = self.body(id)?;
        Ok(iter_edges(&self.state.joints, body.joints)
            .map(|key| self.state.joint_id(key.index))
            .collect())
    }

    pub fn body_joint_count(&self, id: BodyId) -> Result<usize, WorldError> {
        Ok(self.body(id)?.joints.count as usize)
    }

    pub fn body_contact_count(&self, id: BodyId) -> Result<usize, WorldError> {
        Ok(self.body(id)?.contacts.count as usize)
    }
}
