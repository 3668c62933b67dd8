//! P2000 HARVESTER
//! Walks the paged P2000 listing, pulls the dispatch rows out of every page and appends
//! them to a TSV file, flushing after each page so an interrupted run keeps what it got.

pub mod cli;
mod error;
pub mod filter;
mod macros;
pub mod parse;
pub mod process;
pub mod request;
pub mod sink;
pub mod stats;

pub use error::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://www.p2000-online.net/p2000.py";
pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const DEFAULT_MAX_PAGE: usize = 1000;
const START_PAGE: usize = 1;
