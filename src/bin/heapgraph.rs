use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use termcolor::{ColorChoice, StandardStream};
use tracing::debug;
use ustr::ustr;

use heapgraph::file_format::heap_dump::ParseOptions;
use heapgraph::heap_graph::analysis::{hide_node_labels, run, AnalysisOptions, OutputMode};
use heapgraph::heap_graph::reachability::BfsOptions;
use heapgraph::heap_graph::targets::TargetMode;
use heapgraph::logging::init_logging;

/// Find what is rooting or preventing an object from being collected in a GJS
/// heap using a shortest-path breadth-first algorithm.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Garbage collector heap from System.dumpHeap()
    #[arg(value_name = "FILE")]
    heap_file: PathBuf,

    /// Heap address (eg. 0x7fa814054d00) or type prefix (eg. Array, Object,
    /// GObject, Function...)
    #[arg(value_name = "TARGET")]
    target: String,

    /// Treat TARGET as an edge label
    #[arg(short, long, conflicts_with_all = ["function", "string"])]
    edge: bool,

    /// Treat TARGET as a function name
    #[arg(short, long, conflicts_with = "string")]
    function: bool,

    /// Treat TARGET as a string literal or String()
    #[arg(short, long)]
    string: bool,

    /// Only count the matches for TARGET
    #[arg(short, long, help_heading = "Output Options")]
    count: bool,

    /// Output a DOT graph to FILE.dot
    #[arg(short, long, help_heading = "Output Options")]
    dot_graph: bool,

    /// Don't show addresses
    #[arg(long, help_heading = "Output Options")]
    no_addr: bool,

    /// Don't show roots common to the heap FILE
    #[arg(long, value_name = "FILE", help_heading = "Node/Root Filtering")]
    diff_heap: Option<PathBuf>,

    /// Don't show gray roots (marked to be collected)
    #[arg(long, help_heading = "Node/Root Filtering")]
    no_gray_roots: bool,

    /// Don't show WeakMaps
    #[arg(long, help_heading = "Node/Root Filtering")]
    no_weak_maps: bool,

    /// Show the global object (eg. window/GjsGlobal)
    #[arg(short = 'g', long, help_heading = "Node/Root Filtering")]
    show_global: bool,

    /// Show import and module nodes (eg. imports.foo)
    #[arg(short = 'i', long, help_heading = "Node/Root Filtering")]
    show_imports: bool,

    /// Don't show roots with the heap address ADDR
    #[arg(long = "hide-addr", value_name = "ADDR", help_heading = "Node/Root Filtering")]
    hide_addrs: Vec<String>,

    /// Don't show nodes with labels containing LABEL
    #[arg(long = "hide-node", value_name = "LABEL", help_heading = "Node/Root Filtering")]
    hide_nodes: Vec<String>,
}

impl Args {
    fn target_mode(&self) -> TargetMode {
        if self.edge {
            TargetMode::Edge
        } else if self.function {
            TargetMode::Function
        } else if self.string {
            TargetMode::String
        } else {
            TargetMode::Default
        }
    }

    fn to_options(&self) -> AnalysisOptions {
        AnalysisOptions {
            mode: self.target_mode(),
            target: self.target.clone(),
            count_only: self.count,
            output: if self.dot_graph {
                OutputMode::Dot
            } else {
                OutputMode::Tree
            },
            show_addresses: !self.no_addr,
            diff_heap: self.diff_heap.clone(),
            bfs: BfsOptions {
                include_gray_roots: !self.no_gray_roots,
                show_weak_maps: !self.no_weak_maps,
            },
            parse: ParseOptions {
                hide_nodes: hide_node_labels(
                    self.show_global,
                    self.show_imports,
                    &self.hide_nodes,
                    &self.target,
                ),
                hide_addrs: self.hide_addrs.iter().map(|addr| ustr(addr)).collect(),
            },
        }
    }
}

fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();
    let opts = args.to_options();
    debug!(?opts, "parsed arguments");

    let color = if std::io::stdout().is_terminal() {
        ColorChoice::Always
    } else {
        ColorChoice::Never
    };
    let mut stdout = StandardStream::stdout(color);

    match run(&args.heap_file, &opts, &mut stdout) {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::from(255)
        }
    }
}
