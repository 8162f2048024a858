//! Shared-prefix tree of root paths, printed as an indented outline:
//!
//! ```text
//! ╰─[global]─➤ [GjsGlobal jsobj@0x7f01]
//!   ├─[foo]─➤ [Object jsobj@0x7f02]
//!   │ ╰─[bar]─➤ [GObject_Object jsobj@0x7f03 native@0x55aa]
//!   │
//!   ╰─[baz]─➤ [Array jsobj@0x7f04]
//!
//! ```

use std::io;

use termcolor::{ColorSpec, WriteColor};
use ustr::Ustr;

use crate::file_format::heap_dump::GraphAttribs;
use crate::heap_graph::labels::{
    edge_labels_with_synthetic, tree_edge_label, tree_node_label, SyntheticLabels, NATIVE_LABEL,
};

#[derive(Debug, PartialEq, Eq)]
pub struct PathTreeNode {
    pub addr: Ustr,
    pub children: PathTree,
}

/// Children are kept in the order they were first added.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PathTree {
    pub children: Vec<PathTreeNode>,
}

impl PathTree {
    pub fn new() -> Self {
        PathTree::default()
    }

    /// Merge a root-to-node path into the tree.  Adding the same path twice
    /// leaves the tree unchanged.
    pub fn add_path(&mut self, path: &[Ustr]) {
        let mut level = self;
        for addr in path {
            let idx = match level.children.iter().position(|child| child.addr == *addr) {
                Some(idx) => idx,
                None => {
                    level.children.push(PathTreeNode {
                        addr: *addr,
                        children: PathTree::default(),
                    });
                    level.children.len() - 1
                }
            };
            level = &mut level.children[idx].children;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct TreeStyle {
    /// Show `jsobj@` / `native@` addresses after each node.
    pub show_addresses: bool,
}

impl Default for TreeStyle {
    fn default() -> Self {
        TreeStyle {
            show_addresses: true,
        }
    }
}

struct TreeRenderer<'a> {
    graph: &'a GraphAttribs,
    synthetic: &'a SyntheticLabels,
    style: &'a TreeStyle,
    root_edge: ColorSpec,
    edge: ColorSpec,
    node: ColorSpec,
    address: ColorSpec,
}

impl<'a> TreeRenderer<'a> {
    fn write_styled(&self, out: &mut dyn WriteColor, spec: &ColorSpec, text: &str) -> io::Result<()> {
        out.set_color(spec)?;
        write!(out, "{}", text)?;
        out.reset()
    }

    fn render_level(
        &self,
        out: &mut dyn WriteColor,
        children: &[PathTreeNode],
        base: &str,
        parent: Option<Ustr>,
    ) -> io::Result<()> {
        for (i, child) in children.iter().enumerate() {
            let is_last = i + 1 == children.len();
            let addr = child.addr;

            let (edge, edge_spec) = match parent {
                Some(parent) => {
                    let labels = edge_labels_with_synthetic(self.graph, self.synthetic, &parent, &addr);
                    (tree_edge_label(&labels), &self.edge)
                }
                None => (self.graph.root_label(&addr).to_string(), &self.root_edge),
            };

            let label = tree_node_label(self.graph.node_label(&addr));
            let (node, native) = match NATIVE_LABEL.captures(&label) {
                Some(caps) => (
                    caps.get(1).map(|m| m.as_str()).unwrap_or(""),
                    caps.get(2).map(|m| m.as_str()),
                ),
                None => (label.as_str(), None),
            };

            write!(out, "{}{}─[", base, if is_last { "╰" } else { "├" })?;
            self.write_styled(out, edge_spec, &edge)?;
            write!(out, "]─➤ [")?;
            self.write_styled(out, &self.node, node)?;
            if self.style.show_addresses {
                write!(out, " ")?;
                self.write_styled(out, &self.address, &format!("jsobj@{}", addr))?;
                if let Some(native) = native {
                    write!(out, " ")?;
                    self.write_styled(out, &self.address, &format!("native@{}", native))?;
                }
            }
            writeln!(out, "]")?;

            let child_base = format!("{}{}", base, if is_last { "  " } else { "│ " });
            if child.children.is_empty() {
                writeln!(out, "{}", child_base)?;
            } else {
                self.render_level(out, &child.children.children, &child_base, Some(addr))?;
            }
        }
        Ok(())
    }
}

/// Print `tree` to `out`.  Styling only shows up if `out` supports color.
pub fn render_tree(
    out: &mut dyn WriteColor,
    graph: &GraphAttribs,
    synthetic: &SyntheticLabels,
    tree: &PathTree,
    style: &TreeStyle,
) -> io::Result<()> {
    let mut root_edge = ColorSpec::new();
    root_edge.set_italic(true);
    let mut edge = ColorSpec::new();
    edge.set_dimmed(true);
    let mut node = ColorSpec::new();
    node.set_bold(true);
    let mut address = ColorSpec::new();
    address.set_underline(true);

    let renderer = TreeRenderer {
        graph,
        synthetic,
        style,
        root_edge,
        edge,
        node,
        address,
    };
    renderer.render_level(out, &tree.children, "", None)
}
