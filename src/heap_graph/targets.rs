use regex::Regex;
use ustr::{ustr, Ustr, UstrSet};

use crate::file_format::heap_dump::{EdgeGraph, GraphAttribs};

lazy_static! {
    static ref ADDRESS: Regex = Regex::new(r"^(?:[A-F0-9]+|0x[a-f0-9]+)$").unwrap();
}

/// How the TARGET argument should be interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetMode {
    /// Destinations of edges carrying this exact label.
    Edge,
    /// Functions with this name.
    Function,
    /// Strings containing this text.
    String,
    /// An address (JS object, else native pointer) or a type prefix.
    Default,
}

#[derive(Debug, PartialEq, Eq)]
pub struct TargetSelection {
    /// Matching addresses in dump order, without duplicates.
    pub targets: Vec<Ustr>,
    /// "Found ..." summary for the diagnostic stream.
    pub message: String,
}

#[derive(Default)]
struct TargetList {
    targets: Vec<Ustr>,
    seen: UstrSet,
}

impl TargetList {
    fn push(&mut self, addr: Ustr) {
        if self.seen.insert(addr) {
            self.targets.push(addr);
        }
    }

    fn finish(self, message: String) -> TargetSelection {
        TargetSelection {
            targets: self.targets,
            message,
        }
    }
}

/// Labeled declared nodes in dump order.
fn labeled_nodes<'a>(
    edges: &'a EdgeGraph,
    graph: &'a GraphAttribs,
) -> impl Iterator<Item = (Ustr, &'a str)> + 'a {
    edges
        .nodes()
        .filter_map(move |addr| graph.node_labels.get(&addr).map(|label| (addr, label.as_str())))
}

fn target_edge(edges: &EdgeGraph, graph: &GraphAttribs, target: &str) -> TargetSelection {
    let mut list = TargetList::default();
    for origin in edges.nodes() {
        for destination in edges.destinations(origin) {
            if graph
                .edge_labels(&origin, &destination)
                .iter()
                .any(|label| label.as_str() == target)
            {
                list.push(destination);
            }
        }
    }
    let message = format!(
        "Found {} objects with edge label of {}",
        list.targets.len(),
        target
    );
    list.finish(message)
}

fn target_func(edges: &EdgeGraph, graph: &GraphAttribs, target: &str) -> TargetSelection {
    let mut list = TargetList::default();
    for (addr, label) in labeled_nodes(edges, graph) {
        if label.strip_prefix("Function ") == Some(target) {
            list.push(addr);
        }
    }
    let message = format!("Found {} functions named \"{}\"", list.targets.len(), target);
    list.finish(message)
}

fn target_gobject(edges: &EdgeGraph, graph: &GraphAttribs, target: &str) -> TargetSelection {
    let mut list = TargetList::default();
    for (addr, label) in labeled_nodes(edges, graph) {
        if label.ends_with(target) {
            list.push(addr);
        }
    }
    list.finish(format!("Found GObject with address of {}", target))
}

fn target_string(edges: &EdgeGraph, graph: &GraphAttribs, target: &str) -> TargetSelection {
    let mut list = TargetList::default();
    for (addr, label) in labeled_nodes(edges, graph) {
        let text = label
            .strip_prefix("string ")
            .or_else(|| label.strip_prefix("substring "));
        if let Some(text) = text {
            if text.contains(target) {
                list.push(addr);
            }
        }
    }
    let message = format!(
        "Found {} strings containing \"{}\"",
        list.targets.len(),
        target
    );
    list.finish(message)
}

fn target_type(edges: &EdgeGraph, graph: &GraphAttribs, target: &str) -> TargetSelection {
    let mut list = TargetList::default();
    for addr in edges.nodes() {
        if graph.node_label(&addr).starts_with(target) {
            list.push(addr);
        }
    }
    let message = format!(
        "Found {} targets with type \"{}\"",
        list.targets.len(),
        target
    );
    list.finish(message)
}

/// Resolve TARGET to a set of heap addresses.  An empty selection is a
/// legitimate answer; the caller decides what to do about it.
pub fn select_targets(
    mode: TargetMode,
    target: &str,
    edges: &EdgeGraph,
    graph: &GraphAttribs,
) -> TargetSelection {
    let selection = match mode {
        TargetMode::Edge => target_edge(edges, graph, target),
        TargetMode::Function => target_func(edges, graph, target),
        TargetMode::String => target_string(edges, graph, target),
        TargetMode::Default if ADDRESS.is_match(target) => {
            let addr = ustr(target);
            if edges.contains_node(&addr) {
                TargetSelection {
                    targets: vec![addr],
                    message: format!("Found object with address \"{}\"", target),
                }
            } else {
                // Not a JS object, so maybe the native pointer of a wrapper.
                target_gobject(edges, graph, target)
            }
        }
        // Fall back to looking for JS objects by class name.
        TargetMode::Default => target_type(edges, graph, target),
    };

    debug!(?mode, query = target, found = selection.targets.len(), "selected targets");
    selection
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_format::heap_dump::{parse_heap_reader, ParseOptions};

    const HEAP: &str = "\
0x1 B root
==========
0x1 Object
> 0x2 B child
> 0x3 B child
> 0x3 B other
0x2 Function doThings
> 0x4 B child
> 0x3 B child
0x3 GObject_Object 0x55aa01
0x4 string hello world
> 0x5 B base
0x5 substring say hello
0x6 string goodbye
0x7 Function doThingsLater
";

    fn load() -> (EdgeGraph, GraphAttribs) {
        let heap = parse_heap_reader(HEAP.as_bytes(), &ParseOptions::default()).unwrap();
        (heap.edges.to_single_graph(), heap.graph)
    }

    fn addrs(list: &[&str]) -> Vec<Ustr> {
        list.iter().map(|s| ustr(s)).collect()
    }

    #[test]
    fn test_edge_targets_are_deduplicated() {
        let (edges, graph) = load();
        let selection = select_targets(TargetMode::Edge, "child", &edges, &graph);
        assert_eq!(selection.targets, addrs(&["0x2", "0x3", "0x4"]));
        assert_eq!(selection.message, "Found 3 objects with edge label of child");
    }

    #[test]
    fn test_function_targets() {
        let (edges, graph) = load();
        let selection = select_targets(TargetMode::Function, "doThings", &edges, &graph);
        assert_eq!(selection.targets, addrs(&["0x2"]));
        assert_eq!(selection.message, "Found 1 functions named \"doThings\"");
    }

    #[test]
    fn test_string_targets() {
        let (edges, graph) = load();
        let selection = select_targets(TargetMode::String, "hello", &edges, &graph);
        assert_eq!(selection.targets, addrs(&["0x4", "0x5"]));
        assert_eq!(selection.message, "Found 2 strings containing \"hello\"");

        let selection = select_targets(TargetMode::String, "nope", &edges, &graph);
        assert!(selection.targets.is_empty());
    }

    #[test]
    fn test_address_targets() {
        let (edges, graph) = load();

        let selection = select_targets(TargetMode::Default, "0x3", &edges, &graph);
        assert_eq!(selection.targets, addrs(&["0x3"]));
        assert_eq!(selection.message, "Found object with address \"0x3\"");

        // Not a declared node, so look for wrappers of that native pointer.
        let selection = select_targets(TargetMode::Default, "0x55aa01", &edges, &graph);
        assert_eq!(selection.targets, addrs(&["0x3"]));
        assert_eq!(selection.message, "Found GObject with address of 0x55aa01");

        // Uppercase hex needs to drop the 0x prefix to count as an address.
        let selection = select_targets(TargetMode::Default, "0xABC", &edges, &graph);
        assert_eq!(selection.message, "Found 0 targets with type \"0xABC\"");
    }

    #[test]
    fn test_type_prefix_targets() {
        let (edges, graph) = load();
        let selection = select_targets(TargetMode::Default, "Function", &edges, &graph);
        assert_eq!(selection.targets, addrs(&["0x2", "0x7"]));
        assert_eq!(selection.message, "Found 2 targets with type \"Function\"");

        let selection = select_targets(TargetMode::Default, "Array", &edges, &graph);
        assert!(selection.targets.is_empty());
    }
}
