use petgraph::graphmap::DiGraphMap;
use ustr::Ustr;

use crate::file_format::heap_dump::GraphAttribs;
use crate::heap_graph::union_find::UnionFind;

/// Node and edge set covered by a batch of root paths, in first-seen order.
pub type PathGraph = DiGraphMap<Ustr, ()>;

pub fn path_graph<'a>(paths: impl IntoIterator<Item = &'a Vec<Ustr>>) -> PathGraph {
    let mut graph = PathGraph::new();
    for path in paths {
        for addr in path {
            graph.add_node(*addr);
        }
        for pair in path.windows(2) {
            graph.add_edge(pair[0], pair[1], ());
        }
    }
    graph
}

fn is_shape_like(label: &str) -> bool {
    label == "shape" || label == "base_shape"
}

/// Collapse chains of shapes into a single node.  A `shape` node pointing at
/// another `shape` or `base_shape` is merged into it (only the first such
/// edge counts); edges are then rewritten between the surviving nodes and
/// self-loops left over from the merge are dropped.
pub fn compress_shapes(graph: &GraphAttribs, paths: &PathGraph) -> PathGraph {
    let mut shapes = UnionFind::new();
    for x in paths.nodes() {
        if graph.node_label(&x) != "shape" {
            continue;
        }
        if let Some(y) = paths
            .neighbors(x)
            .find(|y| is_shape_like(graph.node_label(y)))
        {
            shapes.union(y, x);
        }
    }

    let mut compressed = PathGraph::new();
    for x in paths.nodes() {
        if shapes.canonical(x) == x {
            compressed.add_node(x);
        }
    }
    for (origin, destination, _) in paths.all_edges() {
        let origin = shapes.canonical(origin);
        let destination = shapes.canonical(destination);
        if origin != destination {
            compressed.add_edge(origin, destination, ());
        }
    }

    debug!(
        before = paths.node_count(),
        after = compressed.node_count(),
        "compressed shapes"
    );
    compressed
}
