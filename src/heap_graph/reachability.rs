use std::collections::VecDeque;

use ustr::{ustr, Ustr, UstrMap, UstrSet};

use crate::file_format::heap_dump::{EdgeGraph, GraphAttribs, WeakMapEntry};

/// Knobs for the root search.
#[derive(Clone, Debug)]
pub struct BfsOptions {
    /// Gray roots are candidates for collection; when false only black roots
    /// get an edge from the synthetic super-root.
    pub include_gray_roots: bool,
    /// Also explain what keeps alive each weak map a path went through.
    pub show_weak_maps: bool,
}

impl Default for BfsOptions {
    fn default() -> Self {
        BfsOptions {
            include_gray_roots: true,
            show_weak_maps: true,
        }
    }
}

/// How a node was first reached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provenance {
    /// Directly from the synthetic super-root; the node is a GC root.
    Root,
    /// Through an ordinary edge.
    Direct { predecessor: Ustr },
    /// Through a weak map entry once both the gating `key` and `weak_map`
    /// had been reached.  `label` describes the implied edge from `key`.
    WeakGated {
        key: Ustr,
        weak_map: Ustr,
        label: Ustr,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DistanceRecord {
    /// Edges from the nearest root; roots are at 0 and the synthetic
    /// super-root would be at -1.
    pub distance: u32,
    pub via: Provenance,
}

/// An edge implied by a weak map entry, found while unwinding a path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntheticEdge {
    pub origin: Ustr,
    pub destination: Ustr,
    pub label: Ustr,
}

/// Root-to-node paths explaining why a target is alive.  The first path ends
/// at the target; any further ones end at weak maps that the first path (or
/// a later one) went through.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RootPaths {
    pub paths: Vec<Vec<Ustr>>,
    pub synthetic_edges: Vec<SyntheticEdge>,
}

/// Map every address participating in a weak map entry (as map, key or key
/// delegate) to the entries it participates in, in entry order.
fn build_weak_index(entries: &[WeakMapEntry]) -> UstrMap<Vec<usize>> {
    let mut index: UstrMap<Vec<usize>> = UstrMap::default();
    for (i, wme) in entries.iter().enumerate() {
        for addr in [wme.weak_map, wme.key, wme.key_delegate].iter().flatten() {
            let ids = index.entry(*addr).or_default();
            // Indices only grow, so a repeat can only come from this entry.
            if ids.last() != Some(&i) {
                ids.push(i);
            }
        }
    }
    index
}

struct BreadthFirstSearch {
    distances: UstrMap<DistanceRecord>,
    work_list: VecDeque<Ustr>,
}

impl BreadthFirstSearch {
    fn distance(&self, addr: &Ustr) -> Option<u32> {
        self.distances.get(addr).map(|record| record.distance)
    }

    fn visit(&mut self, addr: Ustr, distance: u32, via: Provenance) {
        if self.distances.contains_key(&addr) {
            return;
        }
        self.distances.insert(addr, DistanceRecord { distance, via });
        self.work_list.push_back(addr);
    }

    /// Reach `value` through a weak map entry gated on `key` and `weak_map`.
    /// Both gates must already have been reached, and neither may be farther
    /// away than the node being processed at `dist`; otherwise we wait for
    /// the farther one to be processed.
    fn traverse_weak_map_entry(
        &mut self,
        dist: u32,
        key: Option<Ustr>,
        weak_map: Option<Ustr>,
        value: Ustr,
        label_prefix: &str,
    ) {
        let (key, weak_map) = match (key, weak_map) {
            (Some(key), Some(weak_map)) => (key, weak_map),
            _ => return,
        };
        match (self.distance(&key), self.distance(&weak_map)) {
            (Some(key_dist), Some(map_dist)) if key_dist <= dist && map_dist <= dist => {}
            _ => return,
        }
        if self.distances.contains_key(&value) {
            return;
        }

        trace!(%key, %weak_map, %value, "reached through weak map entry");
        let label = ustr(&format!("{} {}", label_prefix, weak_map));
        self.visit(
            value,
            dist + 1,
            Provenance::WeakGated {
                key,
                weak_map,
                label,
            },
        );
    }
}

/// BFS distances from the GC roots, computed on behalf of one target.
#[derive(Debug)]
pub struct Reachability {
    target: Ustr,
    distances: UstrMap<DistanceRecord>,
}

impl Reachability {
    /// Run the search.  The whole reachable heap gets a distance, because a
    /// weak map value may only become reachable once a key discovered much
    /// later in the traversal has been reached.  The target itself is not
    /// expanded, and neither are nodes without a node line.
    pub fn compute(
        edges: &EdgeGraph,
        graph: &GraphAttribs,
        target: Ustr,
        opts: &BfsOptions,
    ) -> Reachability {
        let weak_index = build_weak_index(&graph.weak_map_entries);
        let mut search = BreadthFirstSearch {
            distances: UstrMap::default(),
            work_list: VecDeque::new(),
        };

        // Unlike JS objects, GObjects can be "rooted" by their refcount, so
        // everything hangs off a synthetic super-root (at distance -1) with an
        // edge to each eligible root.
        for (addr, root) in graph.roots.iter() {
            if root.is_black || opts.include_gray_roots {
                search.visit(addr, 0, Provenance::Root);
            }
        }

        while let Some(origin) = search.work_list.pop_front() {
            let dist = match search.distance(&origin) {
                Some(dist) => dist,
                None => continue,
            };

            // Found the target, stop digging.
            if origin == target {
                continue;
            }

            // origin does not point to any other nodes.
            if !edges.contains_node(&origin) {
                continue;
            }

            for destination in edges.destinations(origin) {
                search.visit(
                    destination,
                    dist + 1,
                    Provenance::Direct {
                        predecessor: origin,
                    },
                );
            }

            if let Some(entry_ids) = weak_index.get(&origin) {
                for &i in entry_ids {
                    let wme = &graph.weak_map_entries[i];
                    search.traverse_weak_map_entry(
                        dist,
                        wme.key,
                        wme.weak_map,
                        wme.value,
                        "value in WeakMap",
                    );
                    if let Some(key) = wme.key {
                        search.traverse_weak_map_entry(
                            dist,
                            wme.key_delegate,
                            wme.weak_map,
                            key,
                            "key delegate in WeakMap",
                        );
                    }
                }
            }
        }

        debug!(addr = %target, reached = search.distances.len(), "root search finished");
        Reachability {
            target,
            distances: search.distances,
        }
    }

    pub fn record(&self, addr: &Ustr) -> Option<&DistanceRecord> {
        self.distances.get(addr)
    }

    pub fn distance(&self, addr: &Ustr) -> Option<u32> {
        self.record(addr).map(|record| record.distance)
    }

    pub fn reached_count(&self) -> usize {
        self.distances.len()
    }

    /// Unwind the predecessor links into root-to-node paths.  For nodes
    /// reached through a weak map, the key is followed (it is usually the
    /// more interesting provenance) and the weak map is queued so that what
    /// keeps it alive gets printed too, once.
    pub fn unwind(&self, opts: &BfsOptions) -> RootPaths {
        let mut result = RootPaths::default();
        let mut print_work_list = VecDeque::new();
        let mut printed = UstrSet::default();
        print_work_list.push_back(self.target);
        printed.insert(self.target);

        while let Some(start) = print_work_list.pop_front() {
            let mut path = vec![];
            let mut cursor = Some(start);

            while let Some(addr) = cursor {
                let record = match self.distances.get(&addr) {
                    Some(record) => record,
                    None => break,
                };
                path.push(addr);
                cursor = match &record.via {
                    Provenance::Root => None,
                    Provenance::Direct { predecessor } => Some(*predecessor),
                    Provenance::WeakGated {
                        key,
                        weak_map,
                        label,
                    } => {
                        result.synthetic_edges.push(SyntheticEdge {
                            origin: *key,
                            destination: addr,
                            label: *label,
                        });
                        if opts.show_weak_maps && printed.insert(*weak_map) {
                            print_work_list.push_back(*weak_map);
                        }
                        Some(*key)
                    }
                };
            }

            if !path.is_empty() {
                path.reverse();
                result.paths.push(path);
            }
        }

        result
    }
}

/// Find the shortest paths from the GC roots to `target`.
pub fn find_roots_bfs(
    edges: &EdgeGraph,
    graph: &GraphAttribs,
    target: Ustr,
    opts: &BfsOptions,
) -> RootPaths {
    let span = trace_span!("find_roots_bfs", addr = %target);
    let _span_guard = span.enter();

    Reachability::compute(edges, graph, target, opts).unwind(opts)
}
