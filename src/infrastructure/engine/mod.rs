//! Block execution engine

mod executor_impl;

pub use executor_impl::BlockExecutionEngine;
