//! DOT rendering of the recorded root paths.  Nodes and edges are styled
//! after what they are (native wrappers, functions, scripts, weak maps...) so
//! that the interesting parts of a big retention graph stand out.

use std::path::Path;

use dot_structures::{Attribute, Edge, EdgeTy, Graph, Id, Node, NodeId, Stmt, Vertex};
use graphviz_rust::printer::{DotPrinter, PrinterContext};
use itertools::Itertools;
use regex::Regex;
use ustr::Ustr;

use crate::file_format::heap_dump::GraphAttribs;
use crate::file_utils::write_file_ensuring_parent_dir;
use crate::heap_error::Result;
use crate::heap_graph::labels::{
    edge_labels_with_synthetic, function_name, label_tail, script_file_name, strip_no_private,
    FunctionName, SyntheticLabels,
};
use crate::heap_graph::shape_compression::{compress_shapes, path_graph};

lazy_static! {
    static ref NATIVE_OR_NIL: Regex = Regex::new(r"^([^ ]+) (\(nil\)|0x[a-fA-F0-9]+$)").unwrap();
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DotNodeStyle {
    pub label: String,
    pub color: &'static str,
    pub shape: &'static str,
    pub style: String,
    /// Native address to show under the JS address, if any.
    pub native: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DotEdgeStyle {
    pub label: String,
    pub color: &'static str,
    pub style: &'static str,
}

#[derive(Clone, Debug)]
pub struct DotOptions {
    pub show_addresses: bool,
}

impl Default for DotOptions {
    fn default() -> Self {
        DotOptions {
            show_addresses: true,
        }
    }
}

pub fn classify_node(
    graph: &GraphAttribs,
    addr: &Ustr,
    single_target: Option<Ustr>,
    opts: &DotOptions,
) -> DotNodeStyle {
    let raw = strip_no_private(graph.node_label(addr));
    let incoming = graph
        .first_incoming_label
        .get(addr)
        .map(|label| label.as_str())
        .unwrap_or("");

    let mut node = DotNodeStyle {
        label: raw.to_string(),
        color: "black",
        shape: "rect",
        style: "solid".to_string(),
        native: None,
    };

    if let Some(caps) = NATIVE_OR_NIL.captures(raw) {
        // GObject or something else with a native address.
        let name = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        node.label = name.to_string();
        node.color = "orange";
        node.style = "bold".to_string();
        if opts.show_addresses {
            node.native = caps.get(2).map(|m| m.as_str().to_string());
        }

        if name.starts_with("GObject_") {
            node.shape = "circle";
            if incoming == "prototype" || incoming == "group_proto" {
                node.style.push_str(",dashed");
            }
        } else if name.starts_with("Gjs") || name.starts_with("GIR") {
            node.shape = "octagon";
        }
    } else if raw.starts_with("Function") {
        node.label = match function_name(raw) {
            FunctionName::Closure { outer } => format!("Function via {}()", outer),
            FunctionName::Nested { outer, inner } => format!("Function {} in {}", inner, outer),
            FunctionName::Plain if raw.len() > 10 => format!("{}()", label_tail(raw, 9)),
            FunctionName::Plain => format!("{}()", raw),
        };
        node.color = "green";
        node.style = "bold,rounded".to_string();
    } else if raw == "Call" || raw == "LexicalEnvironment" {
        // A function context.
        node.color = "green";
        node.style = "bold,dashed".to_string();
    } else if raw.starts_with("script") {
        node.label = script_file_name(raw).to_string();
        node.shape = "note";
        node.color = "blue";
    } else if raw.starts_with("WeakMap") {
        node.label = "WeakMap".to_string();
        node.style = "dashed".to_string();
    } else if raw == "base_shape" || raw == "object_group" || raw == "type_object" {
        // Mostly uninteresting.
        node.style = "dotted".to_string();
        if raw == "base_shape" {
            node.label = "shape".to_string();
        } else if raw == "type_object" {
            node.label = "type".to_string();
        }
    }

    if single_target == Some(*addr) {
        node.color = "red";
        node.style = "bold".to_string();
    }

    node
}

pub fn classify_edge(labels: &[Ustr]) -> DotEdgeStyle {
    let labels: Vec<&str> = labels
        .iter()
        .map(|label| label.as_str())
        .filter(|label| !label.starts_with("**UNKNOWN SLOT "))
        .collect();

    let mut edge = DotEdgeStyle {
        label: String::new(),
        color: "black",
        style: "solid",
    };

    match labels.as_slice() {
        [] => {}
        [label] => {
            let label = *label;
            edge.label = if label.starts_with("objects[") {
                // Object children.
                label_tail(label, 7).to_string()
            } else if label.starts_with("objectElements[") {
                // Array elements.
                label_tail(label, 14).to_string()
            } else {
                label.to_string()
            };

            match label {
                "prototype" | "group_proto" => {
                    edge.color = "orange";
                    edge.style = "bold,dashed";
                }
                "fun_environment" => {
                    edge.label.clear();
                    edge.color = "green";
                    edge.style = "bold,dashed";
                }
                "script" => {
                    edge.label.clear();
                    edge.color = "blue";
                }
                "signal connection" => {
                    edge.color = "red";
                    edge.style = "bold,dashed";
                }
                _ => {}
            }

            let chars: Vec<char> = edge.label.chars().collect();
            if chars.len() > 18 {
                let head: String = chars[..8].iter().collect();
                let tail: String = chars[chars.len() - 8..].iter().collect();
                edge.label = format!("{}...{}", head, tail);
            }
        }
        several => {
            edge.label = several.iter().map(|label| escape_label(label)).join(",\\n");
            return edge;
        }
    }

    edge.label = escape_label(&edge.label);
    edge
}

/// Escape text for use inside a quoted DOT string.
fn escape_label(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn quoted(text: String) -> Id {
    Id::Escaped(format!("\"{}\"", text))
}

fn attr(key: &str, value: Id) -> Attribute {
    Attribute(Id::Plain(key.to_string()), value)
}

fn node_id(addr: &Ustr) -> NodeId {
    NodeId(Id::Plain(format!("q{}", addr)), None)
}

/// Build the DOT graph for `paths`, after merging shape chains.  The target
/// is highlighted only when there is exactly one.
pub fn build_dot_graph(
    graph: &GraphAttribs,
    synthetic: &SyntheticLabels,
    paths: &[Vec<Ustr>],
    targets: &[Ustr],
    opts: &DotOptions,
) -> Graph {
    let compressed = compress_shapes(graph, &path_graph(paths));
    let single_target = match targets {
        [target] => Some(*target),
        _ => None,
    };

    let mut stmts = vec![];
    for addr in compressed.nodes() {
        let node = classify_node(graph, &addr, single_target, opts);
        let mut label = escape_label(&node.label);
        if opts.show_addresses {
            label.push_str(&format!("\\njsobj@{}", addr));
            if let Some(native) = &node.native {
                label.push_str(&format!("\\nnative@{}", native));
            }
        }
        stmts.push(Stmt::Node(Node {
            id: node_id(&addr),
            attributes: vec![
                attr("label", quoted(label)),
                attr("color", Id::Plain(node.color.to_string())),
                attr("shape", Id::Plain(node.shape.to_string())),
                attr("style", quoted(node.style)),
            ],
        }));
    }

    for (origin, destination, _) in compressed.all_edges() {
        let labels = edge_labels_with_synthetic(graph, synthetic, &origin, &destination);
        let edge = classify_edge(&labels);
        stmts.push(Stmt::Edge(Edge {
            ty: EdgeTy::Pair(Vertex::N(node_id(&origin)), Vertex::N(node_id(&destination))),
            attributes: vec![
                attr("label", quoted(edge.label)),
                attr("color", Id::Plain(edge.color.to_string())),
                attr("style", quoted(edge.style.to_string())),
            ],
        }));
    }

    Graph::DiGraph {
        id: Id::Plain("heap".to_string()),
        strict: false,
        stmts,
    }
}

pub fn render_dot(graph: &Graph) -> String {
    graph.print(&mut PrinterContext::default())
}

/// Write the DOT graph for `paths` to `out_path`.
pub fn write_dot_file(
    out_path: &Path,
    graph: &GraphAttribs,
    synthetic: &SyntheticLabels,
    paths: &[Vec<Ustr>],
    targets: &[Ustr],
    opts: &DotOptions,
) -> Result<()> {
    let span = trace_span!("write_dot_file", path = %out_path.display());
    let _span_guard = span.enter();

    let dot = build_dot_graph(graph, synthetic, paths, targets, opts);
    let mut contents = render_dot(&dot);
    if !contents.ends_with('\n') {
        contents.push('\n');
    }
    write_file_ensuring_parent_dir(out_path, &contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_format::heap_dump::{parse_heap_reader, ParseOptions};
    use crate::utils::temp_dir::TempDir;
    use ustr::ustr;

    const HEAP: &str = "\
0x1 B global
==========
0x1 GjsGlobal 0x55a0
> 0x2 B objects[3]
> 0x7 B prototype
0x2 Function outer/<
> 0x3 B fun_environment
0x3 Call
> 0x4 B script
0x4 script resource:///org/gnome/shell/ui/main.js
0x5 WeakMap
0x6 Function doSomething
0x7 GObject_Object 0x55aa <no private>
> 0x8 B a
> 0x8 B b
0x8 string \"quoted\"
";

    fn load() -> GraphAttribs {
        parse_heap_reader(HEAP.as_bytes(), &ParseOptions::default())
            .unwrap()
            .graph
    }

    fn classify(graph: &GraphAttribs, addr: &str) -> DotNodeStyle {
        classify_node(graph, &ustr(addr), None, &DotOptions::default())
    }

    #[test]
    fn test_classify_nodes() {
        let graph = load();

        let node = classify(&graph, "0x1");
        assert_eq!((node.label.as_str(), node.color, node.shape), ("GjsGlobal", "orange", "octagon"));
        assert_eq!(node.native.as_deref(), Some("0x55a0"));

        let node = classify(&graph, "0x2");
        assert_eq!(node.label, "Function via outer()");
        assert_eq!((node.color, node.style.as_str()), ("green", "bold,rounded"));

        let node = classify(&graph, "0x3");
        assert_eq!((node.color, node.style.as_str()), ("green", "bold,dashed"));

        let node = classify(&graph, "0x4");
        assert_eq!((node.label.as_str(), node.shape, node.color), ("main.js", "note", "blue"));

        let node = classify(&graph, "0x5");
        assert_eq!((node.label.as_str(), node.style.as_str()), ("WeakMap", "dashed"));

        let node = classify(&graph, "0x6");
        assert_eq!(node.label, "doSomething()");

        // Reached through a prototype edge.
        let node = classify(&graph, "0x7");
        assert_eq!((node.label.as_str(), node.shape), ("GObject_Object", "circle"));
        assert_eq!(node.style, "bold,dashed");

        let hidden = DotOptions {
            show_addresses: false,
        };
        assert_eq!(classify_node(&graph, &ustr("0x7"), None, &hidden).native, None);

        let node = classify_node(&graph, &ustr("0x7"), Some(ustr("0x7")), &hidden);
        assert_eq!((node.color, node.style.as_str()), ("red", "bold"));
    }

    #[test]
    fn test_classify_edges() {
        let edge = classify_edge(&[ustr("objects[3]")]);
        assert_eq!(edge.label, "[3]");

        let edge = classify_edge(&[ustr("objectElements[12]")]);
        assert_eq!(edge.label, "[12]");

        let edge = classify_edge(&[ustr("prototype")]);
        assert_eq!((edge.color, edge.style), ("orange", "bold,dashed"));

        let edge = classify_edge(&[ustr("fun_environment")]);
        assert_eq!((edge.label.as_str(), edge.color), ("", "green"));

        let edge = classify_edge(&[ustr("signal connection")]);
        assert_eq!((edge.color, edge.style), ("red", "bold,dashed"));

        let edge = classify_edge(&[ustr("a_rather_long_property_name")]);
        assert_eq!(edge.label, "a_rather...rty_name");

        let edge = classify_edge(&[ustr("**UNKNOWN SLOT 3"), ustr("parent")]);
        assert_eq!(edge.label, "parent");

        let edge = classify_edge(&[ustr("a"), ustr("b")]);
        assert_eq!(edge.label, "a,\\nb");

        assert_eq!(classify_edge(&[]).label, "");
    }

    #[test]
    fn test_build_dot_graph() {
        let graph = load();
        let paths = vec![
            vec![ustr("0x1"), ustr("0x7"), ustr("0x8")],
            vec![ustr("0x1"), ustr("0x2")],
        ];
        let dot = build_dot_graph(
            &graph,
            &SyntheticLabels::default(),
            &paths,
            &[ustr("0x8")],
            &DotOptions::default(),
        );

        let stmts = match &dot {
            Graph::DiGraph { stmts, .. } => stmts,
            Graph::Graph { .. } => panic!("expected a digraph"),
        };
        let nodes = stmts.iter().filter(|s| matches!(s, Stmt::Node(_))).count();
        let edges = stmts.iter().filter(|s| matches!(s, Stmt::Edge(_))).count();
        assert_eq!((nodes, edges), (4, 3));

        let target = stmts
            .iter()
            .find_map(|s| match s {
                Stmt::Node(node) if node.id == node_id(&ustr("0x8")) => Some(node),
                _ => None,
            })
            .unwrap();
        assert!(target
            .attributes
            .contains(&attr("label", quoted("string \\\"quoted\\\"\\njsobj@0x8".to_string()))));
        assert!(target
            .attributes
            .contains(&attr("color", Id::Plain("red".to_string()))));
    }

    #[test]
    fn test_write_dot_file() {
        let graph = load();
        let dir = TempDir::new("heapgraph-dot-output-test");
        let out_path = dir.join("test.heap.dot");
        let paths = vec![vec![ustr("0x1"), ustr("0x2")]];

        write_dot_file(
            &out_path,
            &graph,
            &SyntheticLabels::default(),
            &paths,
            &[ustr("0x2")],
            &DotOptions::default(),
        )
        .unwrap();

        let written = std::fs::read_to_string(&out_path).unwrap();
        assert!(written.contains("digraph"));
        assert!(written.contains("q0x1"));
        assert!(written.contains("q0x2"));
        assert!(written.contains("jsobj@0x2"));
        assert!(written.trim_end().ends_with('}'));
    }
}
