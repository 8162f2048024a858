use std::path::{Path, PathBuf};

use termcolor::WriteColor;
use ustr::{Ustr, UstrSet};

use crate::file_format::heap_dump::{find_nodes, load_graph, LoadedHeap, ParseOptions};
use crate::heap_error::Result;
use crate::heap_graph::dot_output::{write_dot_file, DotOptions};
use crate::heap_graph::labels::SyntheticLabels;
use crate::heap_graph::path_tree::{render_tree, PathTree, TreeStyle};
use crate::heap_graph::reachability::{find_roots_bfs, BfsOptions, RootPaths};
use crate::heap_graph::targets::{select_targets, TargetMode};

/// Labels hidden unless asked for: the global object and the import
/// machinery keep practically everything alive, which is rarely interesting.
pub const GLOBAL_NODE_LABEL: &str = "GjsGlobal";
pub const IMPORT_NODE_LABELS: [&str; 3] = ["GIRepositoryNamespace", "GjsFileImporter", "GjsModule"];

/// Build the list of node label substrings to hide.  `extra` is added to the
/// defaults, and the explicit target is never hidden.
pub fn hide_node_labels(
    show_global: bool,
    show_imports: bool,
    extra: &[String],
    target: &str,
) -> Vec<String> {
    let mut labels: Vec<String> = vec![];
    for label in ["GIRepositoryNamespace", "GjsFileImporter", GLOBAL_NODE_LABEL, "GjsModule"].iter() {
        if *label == GLOBAL_NODE_LABEL && show_global {
            continue;
        }
        if IMPORT_NODE_LABELS.contains(label) && show_imports {
            continue;
        }
        labels.push(label.to_string());
    }
    labels.extend(extra.iter().cloned());
    labels.retain(|label| label != target);
    labels
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputMode {
    Tree,
    Dot,
}

/// Everything the run needs besides the heap itself.
#[derive(Clone, Debug)]
pub struct AnalysisOptions {
    pub mode: TargetMode,
    pub target: String,
    pub count_only: bool,
    pub output: OutputMode,
    pub show_addresses: bool,
    /// Targets that also exist in this heap are skipped.
    pub diff_heap: Option<PathBuf>,
    pub bfs: BfsOptions,
    pub parse: ParseOptions,
}

impl AnalysisOptions {
    pub fn new(mode: TargetMode, target: &str) -> Self {
        AnalysisOptions {
            mode,
            target: target.to_string(),
            count_only: false,
            output: OutputMode::Tree,
            show_addresses: true,
            diff_heap: None,
            bfs: BfsOptions::default(),
            parse: ParseOptions {
                hide_nodes: hide_node_labels(false, false, &[], target),
                hide_addrs: UstrSet::default(),
            },
        }
    }
}

/// Accumulates root paths across all targets of a run, plus the edge labels
/// implied by weak map entries along those paths.
#[derive(Debug)]
pub struct PathCollector {
    output: OutputMode,
    tree: PathTree,
    dot_paths: Vec<Vec<Ustr>>,
    synthetic: SyntheticLabels,
}

impl PathCollector {
    pub fn new(output: OutputMode) -> Self {
        PathCollector {
            output,
            tree: PathTree::new(),
            dot_paths: vec![],
            synthetic: SyntheticLabels::default(),
        }
    }

    pub fn record(&mut self, root_paths: RootPaths) {
        for edge in root_paths.synthetic_edges {
            self.synthetic.add(edge.origin, edge.destination, edge.label);
        }
        for path in root_paths.paths {
            match self.output {
                OutputMode::Tree => self.tree.add_path(&path),
                OutputMode::Dot => self.dot_paths.push(path),
            }
        }
    }

    pub fn tree(&self) -> &PathTree {
        &self.tree
    }

    pub fn dot_paths(&self) -> &[Vec<Ustr>] {
        &self.dot_paths
    }

    pub fn synthetic(&self) -> &SyntheticLabels {
        &self.synthetic
    }
}

/// Search root paths for every target that is a declared node and is not in
/// `skip`.
pub fn collect_paths(
    heap: &LoadedHeap,
    targets: &[Ustr],
    skip: &UstrSet,
    bfs: &BfsOptions,
    collector: &mut PathCollector,
) {
    for addr in targets {
        if !heap.edges.contains_node(addr) || skip.contains(addr) {
            continue;
        }
        collector.record(find_roots_bfs(&heap.edges, &heap.graph, *addr, bfs));
    }
}

/// How a run ended, short of a fatal error.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    NoTargets,
    Counted(usize),
    Printed { targets: usize },
}

impl Outcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::Printed { .. } => 0,
            Outcome::NoTargets | Outcome::Counted(_) => 255,
        }
    }
}

pub fn dot_file_path(heap_path: &Path) -> PathBuf {
    let mut name = heap_path.as_os_str().to_owned();
    name.push(".dot");
    PathBuf::from(name)
}

/// Run an analysis of the heap at `heap_path`.  The tree goes to `out`;
/// progress and "Found ..." messages go to stderr.
pub fn run(heap_path: &Path, opts: &AnalysisOptions, out: &mut dyn WriteColor) -> Result<Outcome> {
    // Heap diffing; these addrs are read separately due to the sheer amount.
    let skip = match &opts.diff_heap {
        Some(diff_path) => find_nodes(diff_path)?,
        None => UstrSet::default(),
    };

    let heap = load_graph(heap_path, &opts.parse)?;
    let selection = select_targets(opts.mode, &opts.target, &heap.edges, &heap.graph);
    eprintln!("{}", selection.message);

    if selection.targets.is_empty() {
        eprintln!("No targets found for \"{}\".", opts.target);
        return Ok(Outcome::NoTargets);
    }
    if opts.count_only {
        return Ok(Outcome::Counted(selection.targets.len()));
    }

    let mut collector = PathCollector::new(opts.output);
    collect_paths(&heap, &selection.targets, &skip, &opts.bfs, &mut collector);

    match opts.output {
        OutputMode::Dot => {
            let dot_opts = DotOptions {
                show_addresses: opts.show_addresses,
            };
            write_dot_file(
                &dot_file_path(heap_path),
                &heap.graph,
                collector.synthetic(),
                collector.dot_paths(),
                &selection.targets,
                &dot_opts,
            )?;
        }
        OutputMode::Tree => {
            let style = TreeStyle {
                show_addresses: opts.show_addresses,
            };
            render_tree(out, &heap.graph, collector.synthetic(), collector.tree(), &style)?;
            out.flush()?;
        }
    }

    Ok(Outcome::Printed {
        targets: selection.targets.len(),
    })
}
