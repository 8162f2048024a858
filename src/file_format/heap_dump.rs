//! Reader for the textual GC heap dumps produced by `System.dumpHeap()`.
//!
//! A dump has two sections separated by a line of at least ten `=`:
//!
//! ```text
//! # comment
//! 0x7f01 B global object
//! WeakMapEntry map=0x7f10 key=0x7f20 keyDelegate=(nil) value=0x7f30
//! ==========
//! 0x7f01 B GjsGlobal
//! > 0x7f02 B fooSlot
//! 0x7f02 G Object
//! ```
//!
//! The first section lists the GC roots (and weak map entries), the second
//! section lists every node followed by its outgoing edges.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use petgraph::graphmap::DiGraphMap;
use regex::{Captures, Regex};
use ustr::{ustr, Ustr, UstrMap, UstrSet};

use crate::heap_error::{ErrorLayer, HeapError, Result};

/// The color tag optionally present on node and edge lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GcColor {
    Black,
    Gray,
    /// Only seen on weak map related things; treated like gray for roots.
    White,
}

impl GcColor {
    fn from_tag(tag: &str) -> Option<GcColor> {
        match tag {
            "B" => Some(GcColor::Black),
            "G" => Some(GcColor::Gray),
            "W" => Some(GcColor::White),
            _ => None,
        }
    }
}

/// An entry in a weak map.  `value` is only kept alive by the entry if both
/// `weak_map` and `key` are alive.  `key_delegate` plays the same role for the
/// key itself.  Components dumped as `(nil)` are `None`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WeakMapEntry {
    pub weak_map: Option<Ustr>,
    pub key: Option<Ustr>,
    pub key_delegate: Option<Ustr>,
    pub value: Ustr,
}

fn optional_addr(token: &str) -> Option<Ustr> {
    match token {
        "(nil)" | "0x0" => None,
        addr => Some(ustr(addr)),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Root {
    pub is_black: bool,
    pub label: Ustr,
}

/// GC roots in order of first appearance.
#[derive(Clone, Debug, Default)]
pub struct RootSet {
    order: Vec<Ustr>,
    roots: UstrMap<Root>,
}

impl RootSet {
    /// Record a root line.  An address can be listed several times with
    /// different colors; only a black listing replaces an earlier one.
    pub fn note_root(&mut self, addr: Ustr, color: Option<GcColor>, label: Ustr) {
        let is_black = color == Some(GcColor::Black);
        match self.roots.get_mut(&addr) {
            Some(existing) => {
                if is_black {
                    *existing = Root { is_black, label };
                }
            }
            None => {
                self.order.push(addr);
                self.roots.insert(addr, Root { is_black, label });
            }
        }
    }

    pub fn get(&self, addr: &Ustr) -> Option<&Root> {
        self.roots.get(addr)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Ustr, &Root)> + '_ {
        self.order
            .iter()
            .filter_map(move |addr| self.roots.get(addr).map(|root| (*addr, root)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Everything we know about the heap besides its adjacency.  Built once by
/// the parser and read-only afterwards.
#[derive(Debug, Default)]
pub struct GraphAttribs {
    /// origin -> destination -> labels, in the order they were dumped.
    pub edge_labels: UstrMap<UstrMap<Vec<Ustr>>>,
    pub node_labels: UstrMap<Ustr>,
    pub roots: RootSet,
    pub weak_map_entries: Vec<WeakMapEntry>,
    /// The first label dumped on any edge pointing at a node.
    pub first_incoming_label: UstrMap<Ustr>,
}

impl GraphAttribs {
    pub fn node_label(&self, addr: &Ustr) -> &str {
        self.node_labels.get(addr).map(|l| l.as_str()).unwrap_or("")
    }

    pub fn edge_labels(&self, origin: &Ustr, destination: &Ustr) -> &[Ustr] {
        self.edge_labels
            .get(origin)
            .and_then(|dests| dests.get(destination))
            .map(|labels| labels.as_slice())
            .unwrap_or(&[])
    }

    pub fn root_label(&self, addr: &Ustr) -> &str {
        self.roots.get(addr).map(|root| root.label.as_str()).unwrap_or("")
    }
}

/// Adjacency as dumped, counting how many times each edge was listed.  Only
/// nodes that had a (non-hidden) node line are "declared"; destinations that
/// never got a node line exist in the graph but are not declared.
#[derive(Debug, Default)]
pub struct EdgeMultigraph {
    graph: DiGraphMap<Ustr, u32>,
    declared: UstrSet,
}

impl EdgeMultigraph {
    pub fn new() -> Self {
        EdgeMultigraph::default()
    }

    /// Declare a node, dropping any outgoing edges from an earlier
    /// declaration of the same address.
    pub fn declare_node(&mut self, addr: Ustr) {
        if !self.declared.insert(addr) {
            let stale: Vec<Ustr> = self.graph.neighbors(addr).collect();
            for dest in stale {
                self.graph.remove_edge(addr, dest);
            }
        }
        self.graph.add_node(addr);
    }

    pub fn add_edge(&mut self, origin: Ustr, destination: Ustr) {
        if let Some(count) = self.graph.edge_weight_mut(origin, destination) {
            *count += 1;
            return;
        }
        self.graph.add_edge(origin, destination, 1);
    }

    pub fn contains_node(&self, addr: &Ustr) -> bool {
        self.declared.contains(addr)
    }

    pub fn multiplicity(&self, origin: Ustr, destination: Ustr) -> u32 {
        self.graph
            .edge_weight(origin, destination)
            .cloned()
            .unwrap_or(0)
    }

    pub fn node_count(&self) -> usize {
        self.declared.len()
    }

    /// Some consumers don't care about multiple edges, so collapse each
    /// origin's destinations into a set.
    pub fn to_single_graph(&self) -> EdgeGraph {
        let mut graph = DiGraphMap::with_capacity(self.graph.node_count(), self.graph.edge_count());
        for node in self.graph.nodes() {
            graph.add_node(node);
        }
        for (origin, destination, _) in self.graph.all_edges() {
            graph.add_edge(origin, destination, ());
        }
        EdgeGraph {
            graph,
            declared: self.declared.clone(),
        }
    }
}

/// Set-valued adjacency used for traversal.
#[derive(Debug, Default)]
pub struct EdgeGraph {
    graph: DiGraphMap<Ustr, ()>,
    declared: UstrSet,
}

impl EdgeGraph {
    pub fn contains_node(&self, addr: &Ustr) -> bool {
        self.declared.contains(addr)
    }

    /// Declared nodes, in the order they were first seen in the dump.
    pub fn nodes(&self) -> impl Iterator<Item = Ustr> + '_ {
        self.graph
            .nodes()
            .filter(move |node| self.declared.contains(node))
    }

    /// Destinations of a declared node, in dump order.  Undeclared nodes have
    /// no destinations.
    pub fn destinations(&self, addr: Ustr) -> impl Iterator<Item = Ustr> + '_ {
        let declared = self.declared.contains(&addr);
        self.graph.neighbors(addr).filter(move |_| declared)
    }

    pub fn node_count(&self) -> usize {
        self.declared.len()
    }
}

// ## Line classification

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LineKind {
    Edge,
    Node,
    WeakMapEntry,
    Comment,
    Delimiter,
}

/// One classified line of a heap dump.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeapLine<'a> {
    Node {
        addr: Ustr,
        color: Option<GcColor>,
        label: &'a str,
    },
    Edge {
        addr: Ustr,
        color: Option<GcColor>,
        label: &'a str,
    },
    WeakMapEntry(WeakMapEntry),
    Comment,
    Delimiter,
}

lazy_static! {
    // Patterns are tried in order and the first match wins.
    static ref LINE_PATTERNS: Vec<(LineKind, Regex)> = vec![
        (
            LineKind::Edge,
            Regex::new(r"^> ((?:0x)?[a-fA-F0-9]+) (?:([BGW]) )?([^\r\n]*)\r?$").unwrap(),
        ),
        (
            LineKind::Node,
            Regex::new(r"^((?:0x)?[a-fA-F0-9]+) (?:([BGW]) )?([^\r\n]*)\r?$").unwrap(),
        ),
        (
            LineKind::WeakMapEntry,
            Regex::new(
                r"^WeakMapEntry map=([a-zA-Z0-9]+|\(nil\)) key=([a-zA-Z0-9]+|\(nil\)) keyDelegate=([a-zA-Z0-9]+|\(nil\)) value=([a-zA-Z0-9]+)\r?$",
            )
            .unwrap(),
        ),
        (LineKind::Comment, Regex::new(r"^#").unwrap()),
        (LineKind::Delimiter, Regex::new(r"^={10}").unwrap()),
    ];
}

fn group<'a>(caps: &Captures<'a>, i: usize) -> &'a str {
    caps.get(i).map(|m| m.as_str()).unwrap_or("")
}

/// Classify a single line (without its trailing newline).  Returns `None`
/// for lines that fit none of the known shapes.
pub fn classify_line(line: &str) -> Option<HeapLine<'_>> {
    for (kind, re) in LINE_PATTERNS.iter() {
        let caps = match re.captures(line) {
            Some(caps) => caps,
            None => continue,
        };
        return Some(match kind {
            LineKind::Edge => HeapLine::Edge {
                addr: ustr(group(&caps, 1)),
                color: GcColor::from_tag(group(&caps, 2)),
                label: group(&caps, 3),
            },
            LineKind::Node => HeapLine::Node {
                addr: ustr(group(&caps, 1)),
                color: GcColor::from_tag(group(&caps, 2)),
                label: group(&caps, 3),
            },
            LineKind::WeakMapEntry => HeapLine::WeakMapEntry(WeakMapEntry {
                weak_map: optional_addr(group(&caps, 1)),
                key: optional_addr(group(&caps, 2)),
                key_delegate: optional_addr(group(&caps, 3)),
                value: ustr(group(&caps, 4)),
            }),
            LineKind::Comment => HeapLine::Comment,
            LineKind::Delimiter => HeapLine::Delimiter,
        });
    }
    None
}

// ## Parsing

/// Parser configuration.
#[derive(Clone, Debug, Default)]
pub struct ParseOptions {
    /// Nodes whose label contains any of these substrings are left out of the
    /// graph entirely, and their outgoing edges are dropped.
    pub hide_nodes: Vec<String>,
    /// Nodes whose outgoing edges are dropped.
    pub hide_addrs: UstrSet,
}

/// A graph-body line we could not make sense of and skipped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedLine {
    /// 1-based.
    pub line_number: usize,
    pub text: String,
}

#[derive(Debug)]
pub struct ParsedHeap {
    pub edges: EdgeMultigraph,
    pub graph: GraphAttribs,
    pub skipped_lines: Vec<SkippedLine>,
}

struct LineCursor<R> {
    reader: R,
    buf: Vec<u8>,
    line_number: usize,
}

impl<R: BufRead> LineCursor<R> {
    fn new(reader: R) -> Self {
        LineCursor {
            reader,
            buf: vec![],
            line_number: 0,
        }
    }

    /// Labels can hold arbitrary bytes (string contents, file names), so
    /// invalid UTF-8 is replaced rather than treated as a read error.
    fn next_line(&mut self) -> Result<Option<String>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        self.line_number += 1;

        let mut line: &[u8] = &self.buf;
        if line.ends_with(b"\n") {
            line = &line[..line.len() - 1];
            if line.ends_with(b"\r") {
                line = &line[..line.len() - 1];
            }
        }
        Ok(Some(String::from_utf8_lossy(line).into_owned()))
    }
}

fn parse_roots<R: BufRead>(cursor: &mut LineCursor<R>) -> Result<(RootSet, Vec<WeakMapEntry>)> {
    let mut roots = RootSet::default();
    let mut weak_map_entries = vec![];

    while let Some(line) = cursor.next_line()? {
        match classify_line(&line) {
            Some(HeapLine::Node { addr, color, label }) => {
                roots.note_root(addr, color, ustr(label));
            }
            Some(HeapLine::WeakMapEntry(wme)) => weak_map_entries.push(wme),
            // Comments also cover arenas, compartments and zones.
            Some(HeapLine::Comment) => continue,
            Some(HeapLine::Delimiter) => break,
            Some(HeapLine::Edge { .. }) | None => {
                return Err(HeapError::fatal(
                    ErrorLayer::DataLayer,
                    format!("unknown line {}: {}", cursor.line_number, line),
                ));
            }
        }
    }

    trace!(roots = roots.len(), weak_map_entries = weak_map_entries.len(), "parsed roots");
    Ok((roots, weak_map_entries))
}

/// Accumulates the graph body.  `current` is the node the following edge
/// lines belong to.
struct GraphBodyBuilder<'a> {
    opts: &'a ParseOptions,
    edges: EdgeMultigraph,
    edge_labels: UstrMap<UstrMap<Vec<Ustr>>>,
    node_labels: UstrMap<Ustr>,
    first_incoming_label: UstrMap<Ustr>,
    hidden_addrs: UstrSet,
    current: Option<Ustr>,
    skipped_lines: Vec<SkippedLine>,
}

impl<'a> GraphBodyBuilder<'a> {
    fn new(opts: &'a ParseOptions) -> Self {
        GraphBodyBuilder {
            opts,
            edges: EdgeMultigraph::new(),
            edge_labels: UstrMap::default(),
            node_labels: UstrMap::default(),
            first_incoming_label: UstrMap::default(),
            hidden_addrs: opts.hide_addrs.clone(),
            current: None,
            skipped_lines: vec![],
        }
    }

    fn add_node(&mut self, addr: Ustr, label: &str) {
        self.current = Some(addr);

        if self.opts.hide_nodes.iter().any(|hide| label.contains(hide.as_str())) {
            self.hidden_addrs.insert(addr);
            return;
        }

        self.edges.declare_node(addr);
        self.edge_labels.insert(addr, UstrMap::default());
        if !label.is_empty() {
            self.node_labels.insert(addr, ustr(label));
        }
    }

    fn add_edge(&mut self, line_number: usize, line: &str, destination: Ustr, label: &str) {
        let origin = match self.current {
            Some(origin) => origin,
            None => {
                self.skip(line_number, line);
                return;
            }
        };
        if self.hidden_addrs.contains(&origin) {
            return;
        }

        self.edges.add_edge(origin, destination);
        if !label.is_empty() {
            let label = ustr(label);
            self.edge_labels
                .entry(origin)
                .or_default()
                .entry(destination)
                .or_default()
                .push(label);
            self.first_incoming_label.entry(destination).or_insert(label);
        }
    }

    fn skip(&mut self, line_number: usize, line: &str) {
        warn!(line_number, line, "skipping unknown heap line");
        self.skipped_lines.push(SkippedLine {
            line_number,
            text: line.trim_end_matches('\r').to_string(),
        });
    }
}

/// Parse the roots section and the graph body from `reader`.
pub fn parse_heap_reader<R: BufRead>(reader: R, opts: &ParseOptions) -> Result<ParsedHeap> {
    let mut cursor = LineCursor::new(reader);
    let (roots, weak_map_entries) = parse_roots(&mut cursor)?;

    let mut builder = GraphBodyBuilder::new(opts);
    while let Some(line) = cursor.next_line()? {
        let line_number = cursor.line_number;
        match classify_line(&line) {
            Some(HeapLine::Edge { addr, label, .. }) => {
                builder.add_edge(line_number, &line, addr, label)
            }
            Some(HeapLine::Node { addr, label, .. }) => builder.add_node(addr, label),
            Some(HeapLine::Comment) => continue,
            _ => builder.skip(line_number, &line),
        }
    }

    debug!(
        nodes = builder.edges.node_count(),
        hidden = builder.hidden_addrs.len(),
        skipped = builder.skipped_lines.len(),
        "parsed graph body"
    );

    Ok(ParsedHeap {
        edges: builder.edges,
        graph: GraphAttribs {
            edge_labels: builder.edge_labels,
            node_labels: builder.node_labels,
            roots,
            weak_map_entries,
            first_incoming_label: builder.first_incoming_label,
        },
        skipped_lines: builder.skipped_lines,
    })
}

fn open_heap(path: &Path) -> Result<BufReader<File>> {
    match File::open(path) {
        Ok(file) => Ok(BufReader::new(file)),
        Err(err) => Err(HeapError::fatal(
            ErrorLayer::BadInput,
            format!("Cannot open file {}: {}", path.display(), err),
        )),
    }
}

/// Parse the heap dump at `path`.
pub fn parse_heap(path: &Path, opts: &ParseOptions) -> Result<ParsedHeap> {
    let span = trace_span!("parse_heap", path = %path.display());
    let _span_guard = span.enter();

    parse_heap_reader(open_heap(path)?, opts)
}

/// A parsed heap ready for traversal.
#[derive(Debug)]
pub struct LoadedHeap {
    pub edges: EdgeGraph,
    pub graph: GraphAttribs,
    pub skipped_lines: Vec<SkippedLine>,
}

/// Parse the heap at `path` and collapse its multigraph, reporting progress
/// and any skipped lines on stderr.
pub fn load_graph(path: &Path, opts: &ParseOptions) -> Result<LoadedHeap> {
    eprint!("Parsing {}...", path.display());
    let heap = parse_heap(path, opts)?;
    for skipped in &heap.skipped_lines {
        eprintln!("Error: Unknown line: {}", skipped.text);
    }
    let edges = heap.edges.to_single_graph();
    eprintln!("done");

    Ok(LoadedHeap {
        edges,
        graph: heap.graph,
        skipped_lines: heap.skipped_lines,
    })
}

/// List the addresses of every node in the graph body of the heap at `path`,
/// without building a graph.  Used to diff against a second heap.
pub fn find_nodes(path: &Path) -> Result<UstrSet> {
    let reader = open_heap(path)?;
    eprint!("Parsing {}...", path.display());
    let addrs = find_nodes_reader(reader)?;
    eprintln!("done");
    Ok(addrs)
}

pub fn find_nodes_reader<R: BufRead>(reader: R) -> Result<UstrSet> {
    let mut cursor = LineCursor::new(reader);
    let mut addrs = UstrSet::default();

    // Whizz past the roots.
    while let Some(line) = cursor.next_line()? {
        if let Some(HeapLine::Delimiter) = classify_line(&line) {
            break;
        }
    }

    while let Some(line) = cursor.next_line()? {
        if let Some(HeapLine::Node { addr, .. }) = classify_line(&line) {
            addrs.insert(addr);
        }
    }

    Ok(addrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str, opts: &ParseOptions) -> ParsedHeap {
        parse_heap_reader(text.as_bytes(), opts).unwrap()
    }

    const SMALL_HEAP: &str = "\
# Roots.
0x100 B global
0x200 G gray thing
0x200 W again but not black
WeakMapEntry map=0x300 key=0x400 keyDelegate=(nil) value=0x500
==========
# Arena 0x7f00
0x100 B GjsGlobal
> 0x200 B slot
0x200 G Object
> 0x300 B map
> 0x300 B map
> 0x300 B other
0x300 B WeakMap 0x7fab
0x400 Object
";

    #[test]
    fn test_classify_lines() {
        assert_eq!(
            classify_line("0x7fa814054d00 B Function foo"),
            Some(HeapLine::Node {
                addr: ustr("0x7fa814054d00"),
                color: Some(GcColor::Black),
                label: "Function foo",
            })
        );
        assert_eq!(
            classify_line("> 1234 objects[0]\r"),
            Some(HeapLine::Edge {
                addr: ustr("1234"),
                color: None,
                label: "objects[0]",
            })
        );
        assert_eq!(
            classify_line("WeakMapEntry map=(nil) key=0x1 keyDelegate=0x0 value=0x2"),
            Some(HeapLine::WeakMapEntry(WeakMapEntry {
                weak_map: None,
                key: Some(ustr("0x1")),
                key_delegate: None,
                value: ustr("0x2"),
            }))
        );
        assert_eq!(classify_line("# zone 0x1"), Some(HeapLine::Comment));
        assert_eq!(classify_line("=============="), Some(HeapLine::Delimiter));
        assert_eq!(classify_line("========="), None);
        assert_eq!(classify_line("hello world"), None);
        assert_eq!(classify_line(""), None);
    }

    #[test]
    fn test_parse_roots_and_colors() {
        let heap = parse(SMALL_HEAP, &ParseOptions::default());
        let roots = &heap.graph.roots;

        assert_eq!(roots.len(), 2);
        let root_addrs: Vec<Ustr> = roots.iter().map(|(addr, _)| addr).collect();
        assert_eq!(root_addrs, vec![ustr("0x100"), ustr("0x200")]);

        assert!(roots.get(&ustr("0x100")).unwrap().is_black);
        // A non-black repeat must not replace the first listing.
        let gray = roots.get(&ustr("0x200")).unwrap();
        assert!(!gray.is_black);
        assert_eq!(gray.label.as_str(), "gray thing");

        assert_eq!(heap.graph.weak_map_entries.len(), 1);
        assert_eq!(heap.graph.weak_map_entries[0].key_delegate, None);
    }

    #[test]
    fn test_black_root_overrides_gray() {
        let heap = parse(
            "0x1 G first\n0x1 B second\n0x1 G third\n==========\n",
            &ParseOptions::default(),
        );
        let root = heap.graph.roots.get(&ustr("0x1")).unwrap();
        assert!(root.is_black);
        assert_eq!(root.label.as_str(), "second");
    }

    #[test]
    fn test_parse_graph_body() {
        let heap = parse(SMALL_HEAP, &ParseOptions::default());

        assert_eq!(heap.edges.node_count(), 4);
        assert_eq!(heap.edges.multiplicity(ustr("0x200"), ustr("0x300")), 3);
        assert_eq!(
            heap.graph.edge_labels(&ustr("0x200"), &ustr("0x300")),
            &[ustr("map"), ustr("map"), ustr("other")]
        );
        assert_eq!(heap.graph.node_label(&ustr("0x300")), "WeakMap 0x7fab");
        assert_eq!(heap.graph.node_label(&ustr("0x999")), "");
        assert_eq!(
            heap.graph.first_incoming_label.get(&ustr("0x300")),
            Some(&ustr("map"))
        );

        let single = heap.edges.to_single_graph();
        let dests: Vec<Ustr> = single.destinations(ustr("0x200")).collect();
        assert_eq!(dests, vec![ustr("0x300")]);
        assert!(heap.skipped_lines.is_empty());
    }

    #[test]
    fn test_hidden_nodes_drop_their_edges() {
        let opts = ParseOptions {
            hide_nodes: vec!["GjsGlobal".to_string()],
            hide_addrs: UstrSet::default(),
        };
        let heap = parse(SMALL_HEAP, &opts);

        assert!(!heap.edges.contains_node(&ustr("0x100")));
        assert_eq!(heap.edges.multiplicity(ustr("0x100"), ustr("0x200")), 0);
        assert_eq!(heap.edges.node_count(), 3);
    }

    #[test]
    fn test_hidden_addr_keeps_node() {
        let mut hide_addrs = UstrSet::default();
        hide_addrs.insert(ustr("0x200"));
        let opts = ParseOptions {
            hide_nodes: vec![],
            hide_addrs,
        };
        let heap = parse(SMALL_HEAP, &opts);

        assert!(heap.edges.contains_node(&ustr("0x200")));
        assert_eq!(heap.edges.multiplicity(ustr("0x200"), ustr("0x300")), 0);
    }

    #[test]
    fn test_redeclared_node_starts_over() {
        let heap = parse(
            "==========\n0x1 A\n> 0x2 x\n0x1 A again\n> 0x3 y\n",
            &ParseOptions::default(),
        );
        let single = heap.edges.to_single_graph();
        let dests: Vec<Ustr> = single.destinations(ustr("0x1")).collect();
        assert_eq!(dests, vec![ustr("0x3")]);
        assert_eq!(heap.graph.node_label(&ustr("0x1")), "A again");
    }

    #[test]
    fn test_bad_root_line_is_fatal() {
        let err = parse_heap_reader("0x1 B root\nbogus line\n==========\n".as_bytes(), &ParseOptions::default())
            .unwrap_err();
        let details = err.details();
        assert_eq!(details.layer, ErrorLayer::DataLayer);
        assert!(details.message.contains("bogus line"), "{:?}", details);
        assert!(details.message.contains("2"), "{:?}", details);
    }

    #[test]
    fn test_bad_body_lines_are_skipped() {
        let heap = parse(
            "==========\n> 0x9 orphan edge\n0x1 A\nnonsense here\n> 0x2 x\n",
            &ParseOptions::default(),
        );
        assert_eq!(
            heap.skipped_lines,
            vec![
                SkippedLine {
                    line_number: 2,
                    text: "> 0x9 orphan edge".to_string(),
                },
                SkippedLine {
                    line_number: 4,
                    text: "nonsense here".to_string(),
                },
            ]
        );
        // The edge after the bad line still lands on the current node.
        assert_eq!(heap.edges.multiplicity(ustr("0x1"), ustr("0x2")), 1);
    }

    #[test]
    fn test_invalid_utf8_in_body_is_not_fatal() {
        let mut bytes = b"0x1 B root\r\n==========\n0x1 Object\n> 0x2 s\n0x2 string caf".to_vec();
        bytes.push(0xe9);
        bytes.extend_from_slice(b"\n0x3 Object\n");

        let heap = parse_heap_reader(&bytes[..], &ParseOptions::default()).unwrap();
        assert!(heap.skipped_lines.is_empty());
        assert_eq!(heap.edges.node_count(), 3);
        assert_eq!(heap.graph.node_label(&ustr("0x2")), "string caf\u{FFFD}");
        assert_eq!(heap.graph.node_label(&ustr("0x3")), "Object");
        assert!(heap.graph.roots.get(&ustr("0x1")).is_some());

        let addrs = find_nodes_reader(&bytes[..]).unwrap();
        assert!(addrs.contains(&ustr("0x3")));
    }

    #[test]
    fn test_find_nodes() {
        let addrs = find_nodes_reader(SMALL_HEAP.as_bytes()).unwrap();
        assert_eq!(addrs.len(), 4);
        assert!(addrs.contains(&ustr("0x400")));
        // Root-only listings are not nodes.
        assert!(!addrs.contains(&ustr("0x500")));
    }
}
