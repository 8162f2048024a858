extern crate clap;
extern crate itertools;
#[macro_use]
extern crate lazy_static;
extern crate petgraph;
extern crate regex;
extern crate termcolor;
#[macro_use]
extern crate tracing;
extern crate tracing_subscriber;
extern crate ustr;

pub mod file_format;
pub mod heap_graph;

pub mod file_utils;
pub mod heap_error;
pub mod logging;

mod utils;
