use crate::{
    collision::shape::{Filter, Shape, ShapeDef, ShapeGeometry},
    error::WorldError,
    id::{BodyId, ShapeId},
    math::{Aabb, Scalar, Vector},
};

use super::World;

impl World {
    /// Attaches a shape to a body and updates the mass of the body.
    pub fn create_shape(&mut self, body: BodyId, def: &ShapeDef, geometry: ShapeGeometry) -> Result<ShapeId, WorldError> {
        self.check_unlocked()?;
        let body_index = self.body_index(body)?;
        let state = &mut self.state;

        let Some(owner) = state.bodies.get(body_index) else {
            return Err(WorldError::InvalidBody(body));
        };
        let is_enabled = owner.is_enabled;
        let shape = Shape::new(body_index, def, geometry, &owner.transform);
        let (shape_index, revision) = state.shapes.alloc(shape);

        if is_enabled {
            state.create_proxy(shape_index);
        }

        if let Some(owner) = state.bodies.get_mut(body_index) {
            owner.shapes.push(shape_index);
            owner.update_mass(&state.shapes);
        }

        Ok(ShapeId::new(shape_index, state.world_index, revision))
    }

    /// Attaches a circle with the given local center and radius.
    pub fn create_circle_shape(
        &mut self,
        body: BodyId,
        def: &ShapeDef,
        center: Vector,
        radius: Scalar,
    ) -> Result<ShapeId, WorldError> {
        self.create_shape(body, def, ShapeGeometry::Circle { center, radius })
    }

    /// Attaches a capsule between two local points.
    pub fn create_capsule_shape(
        &mut self,
        body: BodyId,
        def: &ShapeDef,
        center1: Vector,
        center2: Vector,
        radius: Scalar,
    ) -> Result<ShapeId, WorldError> {
        self.create_shape(body, def, ShapeGeometry::capsule(center1, center2, radius))
    }

    /// Destroys a shape and its contacts, and updates the mass of its body.
    pub fn destroy_shape(&mut self, id: ShapeId) -> Result<(), WorldError> {
        self.check_unlocked()?;
        let shape_index = self.shape_index(id)?;
        let state = &mut self.state;

        let Some(body_index) = state.shapes.get(shape_index).map(|shape| shape.body_index) else {
            return Err(WorldError::InvalidShape(id));
        };

        state.destroy_shape_contacts(shape_index, true);
        state.broad_phase.remove_proxy(shape_index);

        if let Some(body) = state.bodies.get_mut(body_index) {
            body.shapes.retain(|&index| index != shape_index);
        }
        state.shapes.free(shape_index);

        if let Some(body) = state.bodies.get_mut(body_index) {
            body.update_mass(&state.shapes);
        }

        Ok(())
    }

    fn shape(&self, id: ShapeId) -> Result<&Shape, WorldError> {
        let shape_index = self.shape_index(id)?;
        self.state.shapes.get(shape_index).ok_or(WorldError::InvalidShape(id))
    }

    fn shape_mut(&mut self, id: ShapeId) -> Result<&mut Shape, WorldError> {
        let shape_index = self.shape_index(id)?;
        self.state
            .shapes
            .get_mut(shape_index)
            .ok_or(WorldError::InvalidShape(id))
    }

    /// Returns the body the shape is attached to.
    pub fn shape_body(&self, id: ShapeId) -> Result<BodyId, WorldError> {
        let body_index = self.shape(id)?.body_index;
        Ok(self.state.body_id(body_index))
    }

    pub fn shape_geometry(&self, id: ShapeId) -> Result<ShapeGeometry, WorldError> {
        Ok(self.shape(id)?.geometry)
    }

    /// Returns the tight world-space bounds of the shape.
    pub fn shape_aabb(&self, id: ShapeId) -> Result<Aabb, WorldError> {
        Ok(self.shape(id)?.aabb)
    }

    pub fn shape_density(&self, id: ShapeId) -> Result<Scalar, WorldError> {
        Ok(self.shape(id)?.density)
    }

    /// Sets the density of the shape and updates the mass of its body.
    pub fn set_shape_density(&mut self, id: ShapeId, density: Scalar) -> Result<(), WorldError> {
        self.check_unlocked()?;
        let shape = self.shape_mut(id)?;
        shape.density = density.max(0.0);
        let body_index = shape.body_index;

        let state = &mut self.state;
        if let Some(body) = state.bodies.get_mut(body_index) {
            body.update_mass(&state.shapes);
        }
        Ok(())
    }

    pub fn shape_friction(&self, id: ShapeId) -> Result<Scalar, WorldError> {
        Ok(self.shape(id)?.friction)
    }

    /// Sets the friction of the shape. Existing contacts keep their mixed friction.
    pub fn set_shape_friction(&mut self, id: ShapeId, friction: Scalar) -> Result<(), WorldError> {
        self.check_unlocked()?;
        self.shape_mut(id)?.friction = friction.max(0.0);
        Ok(())
    }

    pub fn shape_restitution(&self, id: ShapeId) -> Result<Scalar, WorldError> {
        Ok(self.shape(id)?.restitution)
    }

    /// Sets the restitution of the shape. Existing contacts keep their mixed restitution.
    pub fn set_shape_restitution(&mut self, id: ShapeId, restitution: Scalar) -> Result<(), WorldError> {
        self.check_unlocked()?;
        self.shape_mut(id)?.restitution = restitution.max(0.0);
        Ok(())
    }

    pub fn shape_filter(&self, id: ShapeId) -> Result<Filter, WorldError> {
        Ok(self.shape(id)?.filter)
    }

    /// Sets the collision filter of the shape.
    ///
    /// Contacts of the shape are destroyed and recreated by the broad phase on the next step
    /// if the new filter still allows them.
    pub fn set_shape_filter(&mut self, id: ShapeId, filter: Filter) -> Result<(), WorldError> {
        self.check_unlocked()?;
        let shape_index = self.shape_index(id)?;
        let shape = self.shape_mut(id)?;
        if shape.filter == filter {
            return Ok(());
        }
        shape.filter = filter;

        self.state.destroy_shape_contacts(shape_index, true);
        Ok(())
    }

    /// Returns the shapes attached to the body.
    pub fn body_shapes(&self, id: BodyId) -> Result<Vec<ShapeId>, WorldError> {
        let body = self.body(id)?;
        Ok(body.shapes.iter().map(|&index| self.state.shape_id(index)).collect())
    }
}
