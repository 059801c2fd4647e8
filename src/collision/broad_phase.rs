//! Finds pairs of shapes whose fat AABBs overlap.
//!
//! The broad phase uses [sweep and prune](https://en.wikipedia.org/wiki/Sweep_and_prune).
//! Proxies are kept sorted along the x-axis across steps, so the insertion sort
//! only has to fix up the few proxies that moved past each other.

use crate::math::Aabb;

use super::shape::Filter;

bitflags::bitflags! {
    /// Flags for proxies in the broad phase.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ProxyFlags: u8 {
        /// Set if the body of the shape is sleeping or static.
        const IS_INACTIVE = 1 << 0;
        /// Set if the body of the shape is static or kinematic.
        const IS_NOT_DYNAMIC = 1 << 1;
    }
}

/// A shape's entry in the broad phase.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Proxy {
    /// The index of the shape in the shape pool.
    pub shape: u32,
    /// The index of the body that owns the shape.
    pub body: u32,
    /// The fat AABB of the shape.
    pub aabb: Aabb,
    /// The collision filter of the shape.
    pub filter: Filter,
    /// The state of the owning body.
    pub flags: ProxyFlags,
}

/// Shape proxies sorted along the x-axis by the minimum of their fat AABBs.
#[derive(Clone, Debug, Default)]
pub struct BroadPhase {
    proxies: Vec<Proxy>,
}

impl BroadPhase {
    /// Creates an empty broad phase with room for `capacity` proxies.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            proxies: Vec::with_capacity(capacity),
        }
    }

    /// Returns the number of proxies.
    #[inline]
    pub fn proxy_count(&self) -> usize {
        self.proxies.len()
    }

    /// Adds a proxy. It is moved into sorted position on the next sweep.
    pub fn add_proxy(&mut self, proxy: Proxy) {
        debug_assert!(self.proxies.iter().all(|p| p.shape != proxy.shape));
        self.proxies.push(proxy);
    }

    /// Removes the proxy of the given shape, keeping the remaining proxies sorted.
    pub fn remove_proxy(&mut self, shape: u32) {
        if let Some(position) = self.proxies.iter().position(|p| p.shape == shape) {
            self.proxies.remove(position);
        }
    }

    /// Refreshes the data of every proxy with the given function.
    pub fn update_proxies(&mut self, mut update: impl FnMut(&mut Proxy)) {
        self.proxies.iter_mut().for_each(|proxy| update(proxy));
    }

    /// Sorts the proxies and calls `on_pair` for each pair of proxies whose fat AABBs overlap,
    /// belong to different bodies, have compatible filters, and are not both inactive or both
    /// non-dynamic.
    pub fn sweep_and_prune(&mut self, mut on_pair: impl FnMut(&Proxy, &Proxy)) {
        insertion_sort(&mut self.proxies, |a, b| a.aabb.min.x > b.aabb.min.x);

        for (i, proxy1) in self.proxies.iter().enumerate() {
            for proxy2 in self.proxies.iter().skip(i + 1) {
                // x doesn't intersect; check this first so we can discard as soon as possible.
                if proxy2.aabb.min.x > proxy1.aabb.max.x {
                    break;
                }

                let shared_flags = proxy1.flags.intersection(proxy2.flags);
                if shared_flags.intersects(ProxyFlags::IS_INACTIVE | ProxyFlags::IS_NOT_DYNAMIC)
                    || proxy1.body == proxy2.body
                    || !proxy1.filter.should_collide(proxy2.filter)
                {
                    continue;
                }

                // y doesn't intersect.
                if proxy1.aabb.min.y > proxy2.aabb.max.y || proxy1.aabb.max.y < proxy2.aabb.min.y {
                    continue;
                }

                on_pair(proxy1, proxy2);
            }
        }
    }
}

/// Sorts a list iteratively using comparisons. In an ascending sort order, when a smaller value
/// is encountered, it is moved lower in the list until it is larger than the item before it.
///
/// This is relatively slow for large lists, but very efficient in cases where the list is already mostly sorted.
fn insertion_sort<T>(items: &mut [T], comparison: fn(&T, &T) -> bool) {
    for i in 1..items.len() {
        let mut j = i;
        while j > 0 && comparison(&items[j - 1], &items[j]) {
            items.swap(j - 1, j);
            j -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vector;

    fn proxy(shape: u32, body: u32, min: (f32, f32), max: (f32, f32)) -> Proxy {
        Proxy {
            shape,
            body,
            aabb: Aabb::new(Vector::new(min.0, min.1), Vector::new(max.0, max.1)),
            filter: Filter::DEFAULT,
            flags: ProxyFlags::empty(),
        }
    }

    fn pairs(broad_phase: &mut BroadPhase) -> Vec<(u32, u32)> {
        let mut pairs = Vec::new();
        broad_phase.sweep_and_prune(|a, b| pairs.push((a.shape.min(b.shape), a.shape.max(b.shape))));
        pairs.sort();
        pairs
    }

    #[test]
    fn finds_overlapping_pairs() {
        let mut broad_phase = BroadPhase::default();
        broad_phase.add_proxy(proxy(0, 0, (2.0, 0.0), (3.0, 1.0)));
        broad_phase.add_proxy(proxy(1, 1, (0.0, 0.0), (2.5, 1.0)));
        broad_phase.add_proxy(proxy(2, 2, (0.0, 5.0), (2.5, 6.0)));
        broad_phase.add_proxy(proxy(3, 1, (2.2, 0.5), (2.8, 0.7)));

        assert_eq!(pairs(&mut broad_phase), vec![(0, 1), (0, 3)]);
    }

    #[test]
    fn skips_inactive_and_non_dynamic_pairs() {
        let mut broad_phase = BroadPhase::default();
        let mut a = proxy(0, 0, (0.0, 0.0), (1.0, 1.0));
        let mut b = proxy(1, 1, (0.5, 0.5), (1.5, 1.5));
        a.flags = ProxyFlags::IS_NOT_DYNAMIC;
        b.flags = ProxyFlags::IS_NOT_DYNAMIC;
        broad_phase.add_proxy(a);
        broad_phase.add_proxy(b);
        assert!(pairs(&mut broad_phase).is_empty());

        broad_phase.update_proxies(|p| {
            if p.shape == 1 {
                p.flags = ProxyFlags::empty();
            }
        });
        assert_eq!(pairs(&mut broad_phase), vec![(0, 1)]);

        broad_phase.remove_proxy(0);
        assert!(pairs(&mut broad_phase).is_empty());
        assert_eq!(broad_phase.proxy_count(), 1);
    }
}
