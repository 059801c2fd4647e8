use bevy_log::debug;

use crate::{
    data_structures::edge_list::{EdgeKey, link_edge},
    dynamics::solver::joints::{
        DistanceJoint, DistanceJointDef, Joint, JointDef, JointKind, JointType, MotorJointDef, MouseJointDef, PrismaticJoint,
        PrismaticJointDef, RevoluteJoint, RevoluteJointDef, TypedJoint, WeldJointDef, WheelJointDef,
    },
    error::WorldError,
    id::{BodyId, JointId},
    math::{Scalar, Vector},
};

use super::World;

impl World {
    /// Creates a joint of any type between two bodies.
    ///
    /// If the joint does not allow the bodies to collide, their existing contacts are destroyed.
    /// A joint without a dynamic body is never solved.
    pub fn create_joint(&mut self, def: impl Into<JointDef>) -> Result<JointId, WorldError> {
        self.check_unlocked()?;
        let def = def.into();
        let (id_a, id_b) = def.bodies();
        let index_a = self.body_index(id_a)?;
        let index_b = self.body_index(id_b)?;
        if index_a == index_b {
            return Err(WorldError::SameBody);
        }

        let blueprint = def.build(&self.body(id_a)?.transform, &self.body(id_b)?.transform);
        let collide_connected = blueprint.collide_connected;

        let state = &mut self.state;
        let (joint_index, revision) = state.joints.alloc(Joint::new(index_a, index_b, blueprint));

        for (side, body_index) in [(0, index_a), (1, index_b)] {
            if let Some(body) = state.bodies.get_mut(body_index) {
                link_edge(&mut state.joints, &mut body.joints, EdgeKey::new(joint_index, side));
            }
        }

        state.link_joint(joint_index);

        if !collide_connected {
            state.destroy_contacts_between(index_a, index_b);
        }

        debug!("created {:?} joint {joint_index}", def.joint_type());
        Ok(JointId::new(joint_index, state.world_index, revision))
    }

    /// Creates a joint that keeps the anchors within a length range, optionally as a spring.
    pub fn create_distance_joint(&mut self, def: &DistanceJointDef) -> Result<JointId, WorldError> {
        self.create_joint(*def)
    }

    /// Creates a joint that drives body B toward a target offset and angle relative to body A.
    pub fn create_motor_joint(&mut self, def: &MotorJointDef) -> Result<JointId, WorldError> {
        self.create_joint(*def)
    }

    /// Creates a soft joint that pulls a point on body B toward a world target.
    ///
    /// Body A only serves as the island anchor and is not moved.
    pub fn create_mouse_joint(&mut self, def: &MouseJointDef) -> Result<JointId, WorldError> {
        self.create_joint(*def)
    }

    /// Creates a joint that lets the bodies slide along an axis fixed in body A.
    pub fn create_prismatic_joint(&mut self, def: &PrismaticJointDef) -> Result<JointId, WorldError> {
        self.create_joint(*def)
    }

    /// Creates a pin joint between the anchors, with an optional angle limit, motor and spring.
    pub fn create_revolute_joint(&mut self, def: &RevoluteJointDef) -> Result<JointId, WorldError> {
        self.create_joint(*def)
    }

    /// Creates a joint that holds the relative pose of the bodies, rigidly or as a spring.
    pub fn create_weld_joint(&mut self, def: &WeldJointDef) -> Result<JointId, WorldError> {
        self.create_joint(*def)
    }

    /// Creates a joint with a suspension spring along an axis of body A and a free rotation.
    pub fn create_wheel_joint(&mut self, def: &WheelJointDef) -> Result<JointId, WorldError> {
        self.create_joint(*def)
    }

    /// Destroys a joint and wakes its bodies.
    pub fn destroy_joint(&mut self, id: JointId) -> Result<(), WorldError> {
        self.check_unlocked()?;
        let joint_index = self.joint_index(id)?;
        self.state.destroy_joint(joint_index, true);
        Ok(())
    }

    fn joint_record(&self, id: JointId) -> Result<&Joint, WorldError> {
        let joint_index = self.joint_index(id)?;
        self.state.joints.get(joint_index).ok_or(WorldError::InvalidJoint(id))
    }

    pub fn joint_type(&self, id: JointId) -> Result<JointType, WorldError> {
        Ok(self.joint_record(id)?.kind.joint_type())
    }

    pub fn joint_body_a(&self, id: JointId) -> Result<BodyId, WorldError> {
        let body_index = self.joint_record(id)?.body_a();
        Ok(self.state.body_id(body_index))
    }

    pub fn joint_body_b(&self, id: JointId) -> Result<BodyId, WorldError> {
        let body_index = self.joint_record(id)?.body_b();
        Ok(self.state.body_id(body_index))
    }

    /// Returns the anchor on body A, in the local space of body A.
    pub fn joint_local_anchor_a(&self, id: JointId) -> Result<Vector, WorldError> {
        Ok(self.joint_record(id)?.local_anchor_a)
    }

    /// Returns the anchor on body B, in the local space of body B.
    pub fn joint_local_anchor_b(&self, id: JointId) -> Result<Vector, WorldError> {
        Ok(self.joint_record(id)?.local_anchor_b)
    }

    pub fn joint_collide_connected(&self, id: JointId) -> Result<bool, WorldError> {
        Ok(self.joint_record(id)?.collide_connected)
    }

    /// Sets whether the bodies of the joint may collide with each other.
    ///
    /// Disabling collision destroys the contacts between the bodies immediately.
    /// Enabling it lets the broad phase create them on the next step.
    pub fn set_joint_collide_connected(&mut self, id: JointId, collide: bool) -> Result<(), WorldError> {
        self.check_unlocked()?;
        let joint_index = self.joint_index(id)?;
        let state = &mut self.state;
        let Some(joint) = state.joints.get_mut(joint_index) else {
            return Err(WorldError::InvalidJoint(id));
        };
        if joint.collide_connected == collide {
            return Ok(());
        }
        joint.collide_connected = collide;
        let (body_a, body_b) = (joint.body_a(), joint.body_b());

        if !collide {
            state.destroy_contacts_between(body_a, body_b);
        }
        Ok(())
    }

    /// Borrows the type-specific data of a joint.
    pub fn joint<T: TypedJoint>(&self, id: JointId) -> Result<&T, WorldError> {
        let kind = &self.joint_record(id)?.kind;
        T::from_kind(kind).ok_or(WorldError::JointTypeMismatch {
            expected: T::TYPE,
            found: kind.joint_type(),
        })
    }

    /// Mutably borrows the type-specific data of a joint. Both bodies are woken up.
    pub fn joint_mut<T: TypedJoint>(&mut self, id: JointId) -> Result<&mut T, WorldError> {
        self.check_unlocked()?;
        let joint_index = self.joint_index(id)?;
        let (body_a, body_b, found) = {
            let joint = self.joint_record(id)?;
            (joint.body_a(), joint.body_b(), joint.kind.joint_type())
        };
        if found != T::TYPE {
            return Err(WorldError::JointTypeMismatch {
                expected: T::TYPE,
                found,
            });
        }

        self.state.wake_body(body_a);
        self.state.wake_body(body_b);

        let joint = self
            .state
            .joints
            .get_mut(joint_index)
            .ok_or(WorldError::InvalidJoint(id))?;
        T::from_kind_mut(&mut joint.kind).ok_or(WorldError::JointTypeMismatch {
            expected: T::TYPE,
            found,
        })
    }

    /// Returns the world-space anchors of a joint.
    fn joint_world_anchors(&self, id: JointId) -> Result<(Vector, Vector), WorldError> {
        let joint = self.joint_record(id)?;
        let transform_a = self.state.bodies.get(joint.body_a()).map(|body| body.transform);
        let transform_b = self.state.bodies.get(joint.body_b()).map(|body| body.transform);
        let (Some(transform_a), Some(transform_b)) = (transform_a, transform_b) else {
            return Err(WorldError::InvalidJoint(id));
        };
        Ok((
            transform_a.transform_point(joint.local_anchor_a),
            transform_b.transform_point(joint.local_anchor_b),
        ))
    }

    /// Returns the current distance between the anchors of a distance joint.
    pub fn distance_joint_current_length(&self, id: JointId) -> Result<Scalar, WorldError> {
        self.joint::<DistanceJoint>(id)?;
        let (anchor_a, anchor_b) = self.joint_world_anchors(id)?;
        Ok(anchor_a.distance(anchor_b))
    }

    /// Returns the current angle of a revolute joint relative to its reference angle.
    pub fn revolute_joint_angle(&self, id: JointId) -> Result<Scalar, WorldError> {
        let revolute = self.joint::<RevoluteJoint>(id)?;
        let joint = self.joint_record(id)?;
        let (Some(body_a), Some(body_b)) = (self.state.bodies.get(joint.body_a()), self.state.bodies.get(joint.body_b()))
        else {
            return Err(WorldError::InvalidJoint(id));
        };
        Ok(revolute.joint_angle(body_a.transform.rotation, body_b.transform.rotation))
    }

    /// Returns the current translation of a prismatic joint along its axis.
    pub fn prismatic_joint_translation(&self, id: JointId) -> Result<Scalar, WorldError> {
        let prismatic = self.joint::<PrismaticJoint>(id)?;
        let joint = self.joint_record(id)?;
        let Some(body_a) = self.state.bodies.get(joint.body_a()) else {
            return Err(WorldError::InvalidJoint(id));
        };
        let (anchor_a, anchor_b) = self.joint_world_anchors(id)?;
        let axis = body_a.transform.rotation * prismatic.local_axis_a();
        Ok(axis.dot(anchor_b - anchor_a))
    }

    /// Returns the reaction force of a joint on body B during the last step.
    pub fn joint_constraint_force(&self, id: JointId) -> Result<Vector, WorldError> {
        let inv_dt = self.inv_dt();
        let joint = self.joint_record(id)?;
        let force = match &joint.kind {
            JointKind::Distance(distance) => {
                let (anchor_a, anchor_b) = self.joint_world_anchors(id)?;
                let axis = (anchor_b - anchor_a).normalize_or_zero();
                distance.constraint_force(inv_dt) * axis
            }
            JointKind::Motor(motor) => motor.constraint_force(inv_dt),
            JointKind::Mouse(mouse) => mouse.constraint_force(inv_dt),
            JointKind::Prismatic(prismatic) => prismatic.constraint_force(inv_dt),
            JointKind::Revolute(revolute) => revolute.constraint_force(inv_dt),
            JointKind::Weld(weld) => weld.constraint_force(inv_dt),
            JointKind::Wheel(wheel) => wheel.constraint_force(inv_dt),
        };
        Ok(force)
    }

    /// Returns the reaction torque of a joint on body B during the last step.
    pub fn joint_constraint_torque(&self, id: JointId) -> Result<Scalar, WorldError> {
        let inv_dt = self.inv_dt();
        let torque = match &self.joint_record(id)?.kind {
            JointKind::Distance(_) | JointKind::Mouse(_) => 0.0,
            JointKind::Motor(motor) => motor.constraint_torque(inv_dt),
            JointKind::Prismatic(prismatic) => prismatic.constraint_torque(inv_dt),
            JointKind::Revolute(revolute) => revolute.constraint_torque(inv_dt),
            JointKind::Weld(weld) => weld.constraint_torque(inv_dt),
            JointKind::Wheel(wheel) => wheel.constraint_torque(inv_dt),
        };
        Ok(torque)
    }
}
