//! Benchmark programs, each a set of configurations of [`crate::runner::run_timed`].

pub mod index;
pub mod parallel;
pub mod pragmas;

pub use index::{IndexVariant, run_index_program};
pub use parallel::{ParallelRun, partition, prepare_parallel, run_parallel};
pub use pragmas::{PragmaMeasure, measure_all, prepare_pragmas};
