//! The sliding-window payment graph.
//!
//! Edges are undirected, deduplicated pairs of account names, each carrying
//! the newest timestamp at which the pair was observed. An edge is live while
//! its timestamp sits inside the half-open window `(latest - 60s, latest]`;
//! advancing `latest` expires everything that falls out. Vertex degrees are
//! routed into a [`MedianIndex`](crate::median::MedianIndex) so each observed
//! record can answer with the current median degree.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::median::MedianIndex;

/// Width of the liveness window in seconds.
pub const WINDOW_SECS: i64 = 60;

type Pair = (String, String);

/// Live edges within the window, plus the degree index derived from them.
///
/// Two views of the edge set are kept in step: `edges`, ordered by timestamp
/// so expiry is a single batch split, and `neighbors`, keyed by the canonical
/// lower endpoint so presence tests and refreshes never scan the time map.
#[derive(Default)]
pub struct WindowGraph {
    vertices: MedianIndex,
    edges: BTreeMap<i64, Vec<Pair>>,
    neighbors: HashMap<String, HashMap<String, i64>>,
    latest: Option<i64>,
}

impl WindowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Integrate one observed payment and return the median degree of the
    /// resulting graph.
    ///
    /// Self-payments never form an edge; an event older than the window
    /// relative to the newest seen is dropped without touching state. Either
    /// way the current median is still returned.
    pub fn observe(&mut self, actor: &str, target: &str, t: i64) -> f64 {
        match actor.cmp(target) {
            Ordering::Less => self.integrate(actor, target, t),
            Ordering::Greater => self.integrate(target, actor, t),
            Ordering::Equal => {}
        }
        self.vertices.median()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.size()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    pub fn degree(&self, name: &str) -> Option<u32> {
        self.vertices.degree(name)
    }

    /// All live degrees, unordered.
    pub fn degrees(&self) -> impl Iterator<Item = u32> + '_ {
        self.vertices.degrees()
    }

    /// The newest timestamp observed, if any.
    pub fn latest(&self) -> Option<i64> {
        self.latest
    }

    /// `a < b` canonically ordered.
    fn integrate(&mut self, a: &str, b: &str, t: i64) {
        let latest = match self.latest {
            None => {
                self.latest = Some(t);
                self.admit(a, b, t);
                return;
            }
            Some(latest) => latest,
        };

        let delta = t - latest;
        if delta > 0 {
            self.latest = Some(t);
            self.expire(t - WINDOW_SECS);
            self.admit(a, b, t);
        } else if delta > -WINDOW_SECS {
            self.admit(a, b, t);
        }
        // delta <= -WINDOW_SECS: already outside the window, never admitted.
    }

    /// Record the edge `(a, b)` at time `t`, either as a brand-new edge or
    /// as a timestamp refresh of one already live.
    fn admit(&mut self, a: &str, b: &str, t: i64) {
        let old = self.neighbors.get(a).and_then(|partners| partners.get(b)).copied();
        match old {
            Some(old_t) => {
                // Refresh: degrees are untouched, the edge just moves to its
                // new timestamp. Buckets are small, the scan is over edges
                // sharing one second.
                let bucket = self.edges.get_mut(&old_t).expect("edge bucket");
                let at = bucket
                    .iter()
                    .position(|(x, y)| x == a && y == b)
                    .expect("edge entry");
                bucket.swap_remove(at);
                if bucket.is_empty() {
                    self.edges.remove(&old_t);
                }
                self.edges.entry(t).or_default().push((a.to_string(), b.to_string()));
                self.neighbors
                    .get_mut(a)
                    .expect("neighbor subtree")
                    .insert(b.to_string(), t);
            }
            None => {
                match (self.vertices.contains(a), self.vertices.contains(b)) {
                    (true, true) => {
                        self.vertices.increment(a);
                        self.vertices.increment(b);
                    }
                    (true, false) => {
                        self.vertices.increment(a);
                        self.vertices.insert(b.to_string());
                    }
                    (false, true) => {
                        self.vertices.insert(a.to_string());
                        self.vertices.increment(b);
                    }
                    (false, false) => {
                        self.vertices.insert(a.to_string());
                        self.vertices.insert(b.to_string());
                    }
                }
                self.neighbors
                    .entry(a.to_string())
                    .or_default()
                    .insert(b.to_string(), t);
                self.edges.entry(t).or_default().push((a.to_string(), b.to_string()));
            }
        }
    }

    /// Drop every edge stamped at or before `cutoff`, unwinding the degree
    /// contributions of each.
    fn expire(&mut self, cutoff: i64) {
        match self.edges.keys().next() {
            Some(&oldest) if oldest <= cutoff => {}
            _ => return,
        }
        let live = self.edges.split_off(&(cutoff + 1));
        let expired = std::mem::replace(&mut self.edges, live);
        for (a, b) in expired.into_values().flatten() {
            let a_gone = self.vertices.decrement(&a);
            let b_gone = self.vertices.decrement(&b);
            if a_gone {
                // No live edges left under this endpoint; its subtree holds
                // nothing but the entry being dropped.
                self.neighbors.remove(&a);
            } else {
                let partners = self.neighbors.get_mut(&a).expect("neighbor subtree");
                partners.remove(&b);
                if partners.is_empty() {
                    self.neighbors.remove(&a);
                }
            }
            if b_gone {
                self.neighbors.remove(&b);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::NaiveDateTime;

    fn at(datetime: &str) -> i64 {
        NaiveDateTime::parse_from_str(datetime, "%Y-%m-%dT%H:%M:%SZ")
            .expect("test timestamp")
            .and_utc()
            .timestamp()
    }

    /// Recompute degrees and liveness from the neighbor view and compare
    /// against the index and the time-ordered view.
    fn check(graph: &WindowGraph) {
        let latest = match graph.latest {
            Some(latest) => latest,
            None => return,
        };

        let mut tally: HashMap<&str, u32> = HashMap::new();
        let mut nedges = 0usize;
        for (a, partners) in &graph.neighbors {
            assert!(!partners.is_empty());
            for (b, &t) in partners {
                assert!(a.as_str() < b.as_str(), "endpoints not canonical");
                assert!(t > latest - WINDOW_SECS && t <= latest, "stale edge survived");
                *tally.entry(a).or_default() += 1;
                *tally.entry(b).or_default() += 1;
                nedges += 1;
                let bucket = graph.edges.get(&t).expect("time bucket");
                assert!(bucket.iter().any(|(x, y)| x == a && y == b));
            }
        }

        assert_eq!(graph.edge_count(), nedges);
        assert_eq!(graph.vertex_count(), tally.len());
        for (name, expected) in tally {
            assert!(expected >= 1);
            assert_eq!(graph.degree(name), Some(expected));
        }
    }

    fn observe(graph: &mut WindowGraph, actor: &str, target: &str, datetime: &str) -> f64 {
        let median = graph.observe(actor, target, at(datetime));
        check(graph);
        assert_eq!(graph.latest().map(|t| t >= at(datetime)), Some(true));
        median
    }

    #[test]
    fn payment_stream_tracks_the_window() {
        let mut graph = WindowGraph::new();

        assert_eq!(observe(&mut graph, "A", "B", "2016-07-09T16:19:01Z"), 1.0);
        assert_eq!((graph.vertex_count(), graph.edge_count()), (2, 1));

        // Within the window but behind the newest event.
        assert_eq!(observe(&mut graph, "C", "D", "2016-07-09T16:19:00Z"), 1.0);
        assert_eq!((graph.vertex_count(), graph.edge_count()), (4, 2));

        assert_eq!(observe(&mut graph, "B", "E", "2016-07-09T16:19:10Z"), 1.0);
        assert_eq!((graph.vertex_count(), graph.edge_count()), (5, 3));

        assert_eq!(observe(&mut graph, "C", "A", "2016-07-09T16:19:20Z"), 2.0);
        assert_eq!((graph.vertex_count(), graph.edge_count()), (5, 4));

        assert_eq!(observe(&mut graph, "A", "E", "2016-07-09T16:19:19Z"), 2.0);
        assert_eq!((graph.vertex_count(), graph.edge_count()), (5, 5));

        // Advancing past 16:20:00 expires the two oldest edges; D returns
        // immediately on the admitted edge.
        assert_eq!(observe(&mut graph, "D", "E", "2016-07-09T16:20:05Z"), 1.0);
        assert_eq!((graph.vertex_count(), graph.edge_count()), (5, 4));

        // D-E is refreshed, not duplicated, while B-E ages out.
        assert_eq!(observe(&mut graph, "D", "E", "2016-07-09T16:20:15Z"), 1.5);
        assert_eq!((graph.vertex_count(), graph.edge_count()), (4, 3));

        assert_eq!(observe(&mut graph, "A", "F", "2016-07-09T16:20:21Z"), 1.0);
        assert_eq!((graph.vertex_count(), graph.edge_count()), (4, 2));

        assert_eq!(observe(&mut graph, "G", "A", "2016-07-09T16:20:22Z"), 1.0);
        assert_eq!((graph.vertex_count(), graph.edge_count()), (5, 3));

        assert_eq!(observe(&mut graph, "A", "E", "2016-07-09T16:20:22Z"), 1.0);
        assert_eq!((graph.vertex_count(), graph.edge_count()), (5, 4));

        assert_eq!(observe(&mut graph, "E", "G", "2016-07-09T16:20:22Z"), 2.0);
        assert_eq!((graph.vertex_count(), graph.edge_count()), (5, 5));

        observe(&mut graph, "F", "H", "2016-07-09T16:20:22Z");
        assert_eq!(observe(&mut graph, "I", "J", "2016-07-09T16:20:22Z"), 1.5);
        assert_eq!((graph.vertex_count(), graph.edge_count()), (8, 7));
    }

    #[test]
    fn window_boundary_is_half_open() {
        let mut graph = WindowGraph::new();
        graph.observe("A", "B", 1000);

        // 59 seconds ahead: the old edge survives exactly at the boundary.
        graph.observe("C", "D", 1059);
        check(&graph);
        assert_eq!(graph.edge_count(), 2);

        // One more second and the 1000-stamped edge is out.
        graph.observe("E", "F", 1060);
        check(&graph);
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.degree("A").is_none());
        assert!(graph.degree("B").is_none());
    }

    #[test]
    fn events_older_than_the_window_are_dropped() {
        let mut graph = WindowGraph::new();
        graph.observe("A", "B", 1000);

        // Exactly 60 seconds behind: dropped, median unchanged.
        let median = graph.observe("C", "D", 940);
        check(&graph);
        assert_eq!(median, 1.0);
        assert_eq!((graph.vertex_count(), graph.edge_count()), (2, 1));

        // 59 seconds behind: still admissible.
        let median = graph.observe("C", "D", 941);
        check(&graph);
        assert_eq!(median, 1.0);
        assert_eq!((graph.vertex_count(), graph.edge_count()), (4, 2));
    }

    #[test]
    fn repeated_observation_refreshes_in_place() {
        let mut graph = WindowGraph::new();
        graph.observe("A", "B", 1000);
        let median = graph.observe("A", "B", 1000);
        check(&graph);
        assert_eq!(median, 1.0);
        assert_eq!((graph.vertex_count(), graph.edge_count()), (2, 1));
        assert_eq!(graph.degree("A"), Some(1));
        assert_eq!(graph.degree("B"), Some(1));

        // A newer stamp keeps the refreshed edge alive past its original
        // expiry point.
        graph.observe("A", "B", 1030);
        graph.observe("C", "D", 1075);
        check(&graph);
        assert_eq!((graph.vertex_count(), graph.edge_count()), (4, 2));
    }

    #[test]
    fn endpoint_order_does_not_matter() {
        let mut forward = WindowGraph::new();
        let mut reversed = WindowGraph::new();
        let m1 = forward.observe("alice", "bob", 2000);
        let m2 = reversed.observe("bob", "alice", 2000);
        assert_eq!(m1, m2);

        let m1 = forward.observe("carol", "alice", 2005);
        let m2 = reversed.observe("alice", "carol", 2005);
        check(&forward);
        check(&reversed);
        assert_eq!(m1, m2);
        assert_eq!(forward.degree("alice"), reversed.degree("alice"));
        assert_eq!(forward.edge_count(), reversed.edge_count());
    }

    #[test]
    fn in_window_permutations_agree() {
        // Same newest timestamp, same per-edge stamps, different arrival
        // orders.
        let events = [
            ("A", "B", 1010i64),
            ("C", "D", 1005),
            ("B", "E", 1008),
            ("A", "C", 1002),
        ];
        let orders = [[0usize, 1, 2, 3], [3, 2, 1, 0], [1, 3, 0, 2]];

        let mut medians = Vec::new();
        for order in &orders {
            let mut graph = WindowGraph::new();
            let mut last = 0.0;
            for &i in order {
                let (u, v, t) = events[i];
                last = graph.observe(u, v, t);
            }
            check(&graph);
            assert_eq!((graph.vertex_count(), graph.edge_count()), (5, 4));
            medians.push(last);
        }
        assert!(medians.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[test]
    fn self_payment_is_not_an_edge() {
        let mut graph = WindowGraph::new();
        graph.observe("A", "B", 1000);
        let median = graph.observe("C", "C", 1010);
        check(&graph);
        assert_eq!(median, 1.0);
        assert_eq!((graph.vertex_count(), graph.edge_count()), (2, 1));
        assert!(!graph.vertices.contains("C"));
    }

    #[test]
    fn new_edge_between_live_vertices_raises_both_degrees() {
        let mut graph = WindowGraph::new();
        graph.observe("A", "B", 1000);
        graph.observe("B", "C", 1001);
        let median = graph.observe("C", "A", 1002);
        check(&graph);
        assert_eq!(median, 2.0);
        assert_eq!(graph.degree("A"), Some(2));
        assert_eq!(graph.degree("B"), Some(2));
        assert_eq!(graph.degree("C"), Some(2));
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn random_streams_match_a_replay_model() {
        use rand::Rng;
        use rand_pcg::Lcg64Xsh32;

        // Replays the window rules naively over a flat edge list and
        // recomputes the median from scratch.
        struct Replay {
            edges: Vec<(String, String, i64)>,
            latest: Option<i64>,
        }

        impl Replay {
            fn observe(&mut self, u: &str, v: &str, t: i64) -> f64 {
                let (a, b) = if u < v { (u, v) } else { (v, u) };
                match self.latest {
                    None => {
                        self.latest = Some(t);
                        self.upsert(a, b, t);
                    }
                    Some(latest) if t > latest => {
                        self.latest = Some(t);
                        self.edges.retain(|(_, _, kept)| *kept > t - WINDOW_SECS);
                        self.upsert(a, b, t);
                    }
                    Some(latest) if t > latest - WINDOW_SECS => self.upsert(a, b, t),
                    Some(_) => {}
                }
                self.median()
            }

            fn upsert(&mut self, a: &str, b: &str, t: i64) {
                match self.edges.iter_mut().find(|(x, y, _)| x == a && y == b) {
                    Some(edge) => edge.2 = t,
                    None => self.edges.push((a.to_string(), b.to_string(), t)),
                }
            }

            fn median(&self) -> f64 {
                let mut tally: HashMap<&str, u32> = HashMap::new();
                for (a, b, _) in &self.edges {
                    *tally.entry(a).or_default() += 1;
                    *tally.entry(b).or_default() += 1;
                }
                let mut degrees: Vec<u32> = tally.into_iter().map(|(_, d)| d).collect();
                degrees.sort_unstable();
                let n = degrees.len();
                if n % 2 == 1 {
                    f64::from(degrees[n / 2])
                } else {
                    f64::from(degrees[n / 2 - 1] + degrees[n / 2]) / 2.0
                }
            }
        }

        let mut rng = Lcg64Xsh32::new(0xcafef00dd15ea5e5, 42);
        let mut graph = WindowGraph::new();
        let mut replay = Replay {
            edges: Vec::new(),
            latest: None,
        };

        let mut clock = 1000i64;
        for _ in 0..400 {
            clock += rng.gen_range(0..7);
            // A fifth of the stream arrives stamped behind the clock, some
            // of it beyond the window entirely.
            let stamp = if rng.gen_range(0..5) == 0 {
                clock - rng.gen_range(1..80)
            } else {
                clock
            };
            let u = format!("account-{}", rng.gen_range(0..12));
            let v = loop {
                let v = format!("account-{}", rng.gen_range(0..12));
                if v != u {
                    break v;
                }
            };

            let median = graph.observe(&u, &v, stamp);
            check(&graph);
            assert_eq!(median, replay.observe(&u, &v, stamp));
            assert_eq!(graph.edge_count(), replay.edges.len());
            assert_eq!(graph.latest(), replay.latest);
        }
    }

    #[test]
    fn expiry_sweeps_multiple_buckets_at_once() {
        let mut graph = WindowGraph::new();
        graph.observe("A", "B", 1000);
        graph.observe("A", "C", 1001);
        graph.observe("B", "C", 1002);
        graph.observe("D", "E", 1030);
        assert_eq!((graph.vertex_count(), graph.edge_count()), (5, 4));

        // Everything before 1030 ages out in one advance.
        let median = graph.observe("D", "F", 1089);
        check(&graph);
        assert_eq!(median, 1.0);
        assert_eq!((graph.vertex_count(), graph.edge_count()), (3, 2));
        assert!(graph.degree("A").is_none());
        assert_eq!(graph.degree("D"), Some(2));
    }
}
