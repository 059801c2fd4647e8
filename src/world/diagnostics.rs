use core::time::Duration;

use crate::dynamics::solver::constraint_graph::GRAPH_COLOR_COUNT;

/// Timings of the phases of the last [`World::step`](super::World::step).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepDiagnostics {
    /// Time spent finding new shape pairs in the broad phase.
    pub broad_phase: Duration,
    /// Time spent updating contact manifolds and contact states.
    pub collide: Duration,
    /// Time spent splitting the split candidate island.
    pub split_island: Duration,
    /// Time spent building solver bodies and preparing constraints.
    pub prepare: Duration,
    pub integrate_velocities: Duration,
    pub warm_start: Duration,
    /// Time spent solving constraints with bias.
    pub solve: Duration,
    pub integrate_positions: Duration,
    /// Time spent solving constraints without bias.
    pub relax: Duration,
    pub restitution: Duration,
    /// Time spent storing impulses for warm starting.
    pub store_impulses: Duration,
    /// Time spent writing the results back to the bodies.
    pub finalize: Duration,
    pub sleep_islands: Duration,
    /// The total time of the step.
    pub step: Duration,
}

impl StepDiagnostics {
    /// Returns the named timers of every phase, in step order.
    pub fn timer_paths(&self) -> Vec<(&'static str, Duration)> {
        vec![
            ("pivot2d/collision/broad_phase", self.broad_phase),
            ("pivot2d/collision/collide", self.collide),
            ("pivot2d/solver/split_island", self.split_island),
            ("pivot2d/solver/prepare", self.prepare),
            ("pivot2d/solver/integrate_velocities", self.integrate_velocities),
            ("pivot2d/solver/warm_start", self.warm_start),
            ("pivot2d/solver/solve", self.solve),
            ("pivot2d/solver/integrate_positions", self.integrate_positions),
            ("pivot2d/solver/relax", self.relax),
            ("pivot2d/solver/restitution", self.restitution),
            ("pivot2d/solver/store_impulses", self.store_impulses),
            ("pivot2d/solver/finalize", self.finalize),
            ("pivot2d/solver/sleep_islands", self.sleep_islands),
            ("pivot2d/step", self.step),
        ]
    }
}

/// Object counts of a [`World`](super::World), recorded after each step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    pub body_count: usize,
    pub shape_count: usize,
    pub contact_count: usize,
    pub joint_count: usize,
    pub island_count: usize,
    pub awake_island_count: usize,
    /// The number of constraints in each graph color. The last entry is the overflow color.
    pub color_counts: [usize; GRAPH_COLOR_COUNT + 1],
}

impl Counters {
    /// Returns the number of constraints that did not fit in a graph color.
    #[inline]
    pub fn overflow_count(&self) -> usize {
        self.color_counts[GRAPH_COLOR_COUNT]
    }
}
