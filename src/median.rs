//! Degree index with constant-time median lookup.
//!
//! Vertex degrees live in a pair of complementary binary heaps: the lower
//! half in a max-heap, the upper half in a min-heap, kept within one element
//! of each other in size so the median is always at a root. A forward map
//! takes a vertex name to its heap slot and a backward map takes a slot back
//! to the names stored there, which is what lets us bump or delete a degree
//! sitting anywhere in either heap in O(log n).

use std::cmp::Ordering;
use std::collections::HashMap;

/// Which of the two heaps a vertex currently lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Half {
    /// Max-heap of degrees at or below the median.
    Lower,
    /// Min-heap of degrees at or above the median.
    Upper,
}

impl Half {
    fn other(self) -> Half {
        match self {
            Half::Lower => Half::Upper,
            Half::Upper => Half::Lower,
        }
    }

    /// Whether degree `a` belongs nearer the root than `b` in this heap.
    fn outranks(self, a: u32, b: u32) -> bool {
        match self {
            Half::Lower => a > b,
            Half::Upper => a < b,
        }
    }
}

#[derive(Clone, Copy)]
struct Slot {
    half: Half,
    pos: usize,
}

/// Names stored at one array position. Both heaps share the index space, so
/// a slot may carry a name on either side, or both.
#[derive(Default)]
struct Names {
    lower: Option<String>,
    upper: Option<String>,
}

impl Names {
    fn take(&mut self, half: Half) -> String {
        match half {
            Half::Lower => self.lower.take(),
            Half::Upper => self.upper.take(),
        }
        .expect("occupied slot")
    }

    fn put(&mut self, half: Half, name: String) {
        let side = match half {
            Half::Lower => &mut self.lower,
            Half::Upper => &mut self.upper,
        };
        debug_assert!(side.is_none());
        *side = Some(name);
    }

    fn is_vacant(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }
}

/// Maps vertex names to degrees and tracks the running median.
///
/// Callers guarantee the preconditions: `insert` takes an absent name,
/// `erase`/`increment`/`decrement` a present one, and `median` a non-empty
/// index. A violation is a bug in the caller and panics.
#[derive(Default)]
pub struct MedianIndex {
    lower: Vec<u32>,
    upper: Vec<u32>,
    forward: HashMap<String, Slot>,
    backward: HashMap<usize, Names>,
}

impl MedianIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new vertex with degree 1.
    pub fn insert(&mut self, name: String) {
        debug_assert!(!self.forward.contains_key(&name));
        // A degree of 1 is a new minimum unless the lower half is all 1s
        // (or empty), in which case either side works and we feed the upper.
        let half = match self.lower.first() {
            Some(&top) if top > 1 => Half::Lower,
            _ => Half::Upper,
        };
        self.heap_push(name, 1, half);
        self.rebalance();
    }

    /// Remove a vertex regardless of its degree.
    pub fn erase(&mut self, name: &str) {
        let Slot { half, pos } = self.forward[name];
        self.heap_erase(pos, half);
        self.rebalance();
    }

    /// Raise a vertex's degree by one.
    pub fn increment(&mut self, name: &str) {
        let Slot { half, pos } = self.forward[name];
        self.heap_mut(half)[pos] += 1;
        match half {
            Half::Upper => self.sift_down(pos, Half::Upper),
            Half::Lower => {
                // The raised degree may climb past the upper half's root.
                self.sift_up(pos, Half::Lower);
                self.heal_from_lower();
            }
        }
    }

    /// Lower a vertex's degree by one, erasing it at zero. Returns whether
    /// the vertex was erased.
    pub fn decrement(&mut self, name: &str) -> bool {
        let Slot { half, pos } = self.forward[name];
        if self.heap(half)[pos] == 1 {
            self.heap_erase(pos, half);
            self.rebalance();
            return true;
        }
        self.heap_mut(half)[pos] -= 1;
        match half {
            Half::Lower => self.sift_down(pos, Half::Lower),
            Half::Upper => {
                // The lowered degree may sink past the lower half's root.
                self.sift_up(pos, Half::Upper);
                self.heal_from_upper();
            }
        }
        false
    }

    pub fn contains(&self, name: &str) -> bool {
        self.forward.contains_key(name)
    }

    pub fn degree(&self, name: &str) -> Option<u32> {
        let &Slot { half, pos } = self.forward.get(name)?;
        Some(self.heap(half)[pos])
    }

    pub fn size(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn lower_len(&self) -> usize {
        self.lower.len()
    }

    pub fn upper_len(&self) -> usize {
        self.upper.len()
    }

    /// All live degrees, in heap order.
    pub fn degrees(&self) -> impl Iterator<Item = u32> + '_ {
        self.lower.iter().chain(self.upper.iter()).copied()
    }

    /// The median degree: the larger half's root, or the mean of both roots
    /// when the halves are level. Panics on an empty index.
    pub fn median(&self) -> f64 {
        assert!(!self.is_empty(), "median of an empty degree index");
        match self.lower.len().cmp(&self.upper.len()) {
            Ordering::Greater => f64::from(self.lower[0]),
            Ordering::Less => f64::from(self.upper[0]),
            Ordering::Equal => f64::from(self.lower[0] + self.upper[0]) / 2.0,
        }
    }

    fn heap(&self, half: Half) -> &Vec<u32> {
        match half {
            Half::Lower => &self.lower,
            Half::Upper => &self.upper,
        }
    }

    fn heap_mut(&mut self, half: Half) -> &mut Vec<u32> {
        match half {
            Half::Lower => &mut self.lower,
            Half::Upper => &mut self.upper,
        }
    }

    /// The only primitive that moves heap elements. Swaps the degrees and
    /// keeps both maps pointing at the right slots.
    fn swap_nodes(&mut self, i: usize, j: usize, half: Half) {
        if i == j {
            return;
        }
        self.heap_mut(half).swap(i, j);
        let a = self.backward.get_mut(&i).expect("slot names").take(half);
        let b = self.backward.get_mut(&j).expect("slot names").take(half);
        self.forward.get_mut(&a).expect("forward entry").pos = j;
        self.forward.get_mut(&b).expect("forward entry").pos = i;
        self.backward.get_mut(&j).expect("slot names").put(half, a);
        self.backward.get_mut(&i).expect("slot names").put(half, b);
    }

    fn sift_up(&mut self, mut i: usize, half: Half) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if half.outranks(self.heap(half)[i], self.heap(half)[parent]) {
                self.swap_nodes(i, parent, half);
                i = parent;
            } else {
                return;
            }
        }
    }

    fn sift_down(&mut self, mut i: usize, half: Half) {
        loop {
            let n = self.heap(half).len();
            let left = 2 * i + 1;
            if left >= n {
                return;
            }
            let right = left + 1;
            let mut child = left;
            if right < n && half.outranks(self.heap(half)[right], self.heap(half)[left]) {
                child = right;
            }
            if half.outranks(self.heap(half)[child], self.heap(half)[i]) {
                self.swap_nodes(i, child, half);
                i = child;
            } else {
                return;
            }
        }
    }

    /// Append a named degree to a heap and restore its order.
    fn heap_push(&mut self, name: String, degree: u32, half: Half) {
        let pos = self.heap(half).len();
        self.heap_mut(half).push(degree);
        self.backward.entry(pos).or_default().put(half, name.clone());
        self.forward.insert(name, Slot { half, pos });
        self.sift_up(pos, half);
    }

    /// Remove the element at `pos`, dropping its maps entries. Returns the
    /// removed name. The element swapped into the hole can end up outranking
    /// its new parent as well as its children, so both sifts run; at most
    /// one of them moves anything.
    fn heap_erase(&mut self, pos: usize, half: Half) -> String {
        let last = self.heap(half).len() - 1;
        self.swap_nodes(pos, last, half);
        self.heap_mut(half).pop();
        let names = self.backward.get_mut(&last).expect("slot names");
        let name = names.take(half);
        if names.is_vacant() {
            self.backward.remove(&last);
        }
        self.forward.remove(&name);
        if pos < self.heap(half).len() {
            self.sift_down(pos, half);
            self.sift_up(pos, half);
        }
        name
    }

    /// Move the root of `from` onto the other heap.
    fn rotate(&mut self, from: Half) {
        let degree = self.heap(from)[0];
        let name = self.heap_erase(0, from);
        self.heap_push(name, degree, from.other());
    }

    /// Restore the size bound after an insert or erase.
    fn rebalance(&mut self) {
        if self.lower.len() >= self.upper.len() + 2 {
            self.rotate(Half::Lower);
        } else if self.upper.len() >= self.lower.len() + 2 {
            self.rotate(Half::Upper);
        }
    }

    /// After an increment in the lower half: if its root climbed past the
    /// upper root, hand it over, and pull the upper root back when a single
    /// rotation would leave the sizes two apart.
    fn heal_from_lower(&mut self) {
        if self.lower.is_empty() || self.upper.is_empty() {
            return;
        }
        if self.lower[0] <= self.upper[0] {
            return;
        }
        let diff = self.lower.len() as isize - self.upper.len() as isize;
        self.rotate(Half::Lower);
        if diff <= 0 {
            self.rotate(Half::Upper);
        }
    }

    /// Mirror of `heal_from_lower` for a decrement in the upper half.
    fn heal_from_upper(&mut self) {
        if self.lower.is_empty() || self.upper.is_empty() {
            return;
        }
        if self.lower[0] <= self.upper[0] {
            return;
        }
        let diff = self.lower.len() as isize - self.upper.len() as isize;
        self.rotate(Half::Upper);
        if diff >= 0 {
            self.rotate(Half::Lower);
        }
    }
}
