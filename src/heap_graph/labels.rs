use itertools::Itertools;
use regex::Regex;
use ustr::{Ustr, UstrMap};

use crate::file_format::heap_dump::GraphAttribs;

lazy_static! {
    /// `Function name/inner`, where inner is `<` for anonymous closures.
    pub static ref FUNCTION_LABEL: Regex =
        Regex::new(r"^Function(?: ([^/]+)(?:/([<|\w]+))?)?").unwrap();
    /// Labels of objects that wrap a native (GObject etc.) pointer end with
    /// that pointer.
    pub static ref NATIVE_LABEL: Regex = Regex::new(r"^([^ ]+) (0x[a-fA-F0-9]+$)").unwrap();
}

const NO_PRIVATE_SUFFIX: &str = " <no private>";
const MAX_NODE_LABEL_CHARS: usize = 50;

pub fn strip_no_private(label: &str) -> &str {
    label.strip_suffix(NO_PRIVATE_SUFFIX).unwrap_or(label)
}

/// Byte-slice `label` from `start`, yielding "" rather than panicking when the
/// label is too short or `start` isn't a char boundary.
pub fn label_tail(label: &str, start: usize) -> &str {
    label.get(start..).unwrap_or("")
}

/// `script resource:///org/gnome/foo/bar.js` becomes `bar.js`.
pub fn script_file_name(label: &str) -> &str {
    label_tail(label, 7).rsplit('/').next().unwrap_or("")
}

/// The parts of a `Function ...` label.
pub enum FunctionName<'a> {
    /// `Function outer/<`
    Closure { outer: &'a str },
    /// `Function outer/inner`
    Nested { outer: &'a str, inner: &'a str },
    Plain,
}

pub fn function_name(label: &str) -> FunctionName<'_> {
    let caps = match FUNCTION_LABEL.captures(label) {
        Some(caps) => caps,
        None => return FunctionName::Plain,
    };
    let outer = caps.get(1).map(|m| m.as_str()).unwrap_or("");
    match caps.get(2).map(|m| m.as_str()) {
        Some("<") => FunctionName::Closure { outer },
        Some(inner) => FunctionName::Nested { outer, inner },
        None => FunctionName::Plain,
    }
}

/// Node label as shown in the tree output.
pub fn tree_node_label(label: &str) -> String {
    let label = strip_no_private(label);

    if label.starts_with("Function ") {
        return match function_name(label) {
            FunctionName::Closure { outer } => format!("Function via {}", outer),
            FunctionName::Nested { outer, inner } => format!("Function {} in {}", inner, outer),
            FunctionName::Plain => label.to_string(),
        };
    }

    let label = if label.starts_with("script") {
        script_file_name(label)
    } else if label.starts_with("WeakMap") {
        "WeakMap"
    } else if label == "base_shape" {
        "shape"
    } else if label == "type_object" {
        "type"
    } else {
        label
    };

    label.chars().take(MAX_NODE_LABEL_CHARS).collect()
}

/// Edge label as shown in the tree output.
pub fn tree_edge_label(labels: &[Ustr]) -> String {
    match labels {
        [] => String::new(),
        [single] if single.as_str() == "signal connection" => "GSignal".to_string(),
        [single] => single.to_string(),
        several => several.iter().join(", "),
    }
}

/// Edge labels that only exist because a path went through a weak map entry
/// (`value in WeakMap 0x...`).  These are kept apart from the parsed labels so
/// the parsed graph stays read-only.
#[derive(Debug, Default)]
pub struct SyntheticLabels {
    labels: UstrMap<UstrMap<Vec<Ustr>>>,
}

impl SyntheticLabels {
    pub fn add(&mut self, origin: Ustr, destination: Ustr, label: Ustr) {
        let labels = self
            .labels
            .entry(origin)
            .or_default()
            .entry(destination)
            .or_default();
        if !labels.contains(&label) {
            labels.push(label);
        }
    }

    pub fn get(&self, origin: &Ustr, destination: &Ustr) -> &[Ustr] {
        self.labels
            .get(origin)
            .and_then(|dests| dests.get(destination))
            .map(|labels| labels.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Dumped labels for the edge followed by any synthetic ones.
pub fn edge_labels_with_synthetic(
    graph: &GraphAttribs,
    synthetic: &SyntheticLabels,
    origin: &Ustr,
    destination: &Ustr,
) -> Vec<Ustr> {
    graph
        .edge_labels(origin, destination)
        .iter()
        .chain(synthetic.get(origin, destination))
        .cloned()
        .collect()
}
