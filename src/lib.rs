pub mod artifact;
pub mod config;
pub mod context;
pub mod domain;
pub mod driver;
pub mod error;
pub mod git;
pub mod graph;
pub mod images;
pub mod latex;
pub mod report;
pub mod state;
pub mod tools;

pub use error::{BuildError, Result};
