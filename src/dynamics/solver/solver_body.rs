//! Efficient rigid body definitions used by the performance-critical solver.
//!
//! This helps improve memory locality and makes random access faster for the constraint solver.

use core::marker::PhantomData;

use crate::math::{Rotation, Scalar, Vector};

// The `SolverBody` layout is inspired by `b2BodyState` in Box2D v3.

/// An optimized representation of rigid body data used by the solver,
/// designed to improve memory locality and performance.
///
/// Only awake dynamic bodies and kinematic bodies have an associated solver body.
/// Static bodies do not move, so they instead use a dummy state with [`SolverBody::DUMMY`].
///
/// Positions are stored as deltas from the start of the step. This avoids round-off error
/// far from the origin, and lets static bodies use a known delta of zero.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SolverBody {
    /// The linear velocity of the center of mass.
    pub linear_velocity: Vector,
    /// The angular velocity of the body.
    pub angular_velocity: Scalar,
    /// The change in position of the center of mass during this step.
    pub delta_position: Vector,
    /// The change in rotation of the body during this step.
    pub delta_rotation: Rotation,
}

impl SolverBody {
    /// A dummy [`SolverBody`] for static bodies.
    pub const DUMMY: Self = Self {
        linear_velocity: Vector::ZERO,
        angular_velocity: 0.0,
        delta_position: Vector::ZERO,
        delta_rotation: Rotation::IDENTITY,
    };

    /// Computes the velocity at the given `point` relative to the center of the body.
    #[inline]
    pub fn velocity_at_point(&self, point: Vector) -> Vector {
        self.linear_velocity + self.angular_velocity * point.perp()
    }
}

/// Per-step simulation data of a [`SolverBody`] that is read but never written by constraints.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SolverBodyData {
    /// The index of the body in the world's body pool.
    pub body_index: u32,
    pub inv_mass: Scalar,
    pub inv_inertia: Scalar,
    pub force: Vector,
    pub torque: Scalar,
    pub gravity_scale: Scalar,
    pub linear_damping: Scalar,
    pub angular_damping: Scalar,
    pub is_kinematic: bool,
}

/// The [solver bodies](SolverBody) of the awake, simulated bodies for one step.
#[derive(Clone, Debug, Default)]
pub struct SolverBodies {
    bodies: Vec<SolverBody>,
    data: Vec<SolverBodyData>,
}

impl SolverBodies {
    /// Creates a new empty collection of solver bodies.
    pub const fn new() -> Self {
        Self {
            bodies: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Adds a new solver body.
    pub fn push(&mut self, body: SolverBody, data: SolverBodyData) -> SolverBodyIndex {
        let index = SolverBodyIndex(self.bodies.len());
        self.bodies.push(body);
        self.data.push(data);
        index
    }

    /// Clears all solver bodies.
    pub fn clear(&mut self) {
        self.bodies.clear();
        self.data.clear();
    }

    /// Returns the number of solver bodies.
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// Returns `true` if there are no solver bodies.
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Returns a reference to the solver body with the given index.
    pub fn get(&self, index: SolverBodyIndex) -> Option<&SolverBody> {
        self.bodies.get(index.0)
    }

    /// Returns the simulation data of the solver body with the given index.
    pub fn data(&self, index: SolverBodyIndex) -> Option<&SolverBodyData> {
        self.data.get(index.0)
    }

    /// Returns the solver bodies and their simulation data as slices.
    pub fn split_mut(&mut self) -> (&mut [SolverBody], &[SolverBodyData]) {
        (&mut self.bodies, &self.data)
    }

    /// Returns an iterator over the solver bodies and their simulation data.
    pub fn iter(&self) -> impl Iterator<Item = (&SolverBody, &SolverBodyData)> {
        self.bodies.iter().zip(self.data.iter())
    }

    /// Returns a view for accessing pairs of solver bodies from several threads.
    pub fn view(&mut self) -> SolverBodiesView<'_> {
        SolverBodiesView {
            ptr: self.bodies.as_mut_ptr(),
            len: self.bodies.len(),
            _marker: PhantomData,
        }
    }
}

/// The index of a [`SolverBody`] in [`SolverBodies`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SolverBodyIndex(pub usize);

impl SolverBodyIndex {
    /// An invalid index that can be used to indicate that the body is static.
    pub const INVALID: Self = Self(usize::MAX);

    /// Returns `true` if the index represents a valid awake body.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.0 != usize::MAX
    }
}

/// Shared access to [`SolverBodies`] for solving the constraints of a single graph color in parallel.
///
/// No two constraints in the same color share a non-static body, so each task
/// can mutate the bodies of its own constraints without synchronization.
#[derive(Clone, Copy)]
pub struct SolverBodiesView<'a> {
    ptr: *mut SolverBody,
    len: usize,
    _marker: PhantomData<&'a mut [SolverBody]>,
}

// SAFETY: The view only hands out references through `pair_mut`,
// whose contract forbids aliasing between threads.
unsafe impl Send for SolverBodiesView<'_> {}
unsafe impl Sync for SolverBodiesView<'_> {}

impl<'a> SolverBodiesView<'a> {
    /// Returns mutable references to the two solver bodies with the given indices.
    ///
    /// If a given index is [`SolverBodyIndex::INVALID`], the corresponding body will be `None`.
    ///
    /// # Safety
    ///
    /// - `a != b` unless both are [`SolverBodyIndex::INVALID`].
    /// - No other reference to either body may be alive, on this thread or any other,
    ///   while the returned references are in use.
    #[inline]
    pub unsafe fn pair_mut(
        &self,
        a: SolverBodyIndex,
        b: SolverBodyIndex,
    ) -> (Option<&'a mut SolverBody>, Option<&'a mut SolverBody>) {
        debug_assert!(a != b || !a.is_valid());
        let get = |index: SolverBodyIndex| {
            if index.is_valid() {
                assert!(index.0 < self.len, "solver body index {index:?} out of bounds");
                // SAFETY: The index is in bounds, and the caller guarantees exclusive access.
                Some(unsafe { &mut *self.ptr.add(index.0) })
            } else {
                None
            }
        };
        (get(a), get(b))
    }

    /// Calls `f` with the solver bodies for the given indices,
    /// substituting [`SolverBody::DUMMY`] for static bodies.
    ///
    /// # Safety
    ///
    /// The same requirements as [`SolverBodiesView::pair_mut`] apply.
    #[inline]
    pub unsafe fn with_pair<R>(
        &self,
        a: SolverBodyIndex,
        b: SolverBodyIndex,
        f: impl FnOnce(&mut SolverBody, &mut SolverBody) -> R,
    ) -> R {
        let mut dummy_a = SolverBody::DUMMY;
        let mut dummy_b = SolverBody::DUMMY;
        // SAFETY: Upheld by the caller.
        let (body_a, body_b) = unsafe { self.pair_mut(a, b) };
        f(
            body_a.unwrap_or(&mut dummy_a),
            body_b.unwrap_or(&mut dummy_b),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_bodies_use_dummies() {
        let mut bodies = SolverBodies::new();
        let index = bodies.push(SolverBody::DUMMY, SolverBodyData::default());
        let view = bodies.view();

        unsafe {
            view.with_pair(index, SolverBodyIndex::INVALID, |a, b| {
                a.linear_velocity = Vector::X;
                b.linear_velocity = Vector::Y;
            });
        }

        assert_eq!(bodies.get(index).unwrap().linear_velocity, Vector::X);
    }
}
