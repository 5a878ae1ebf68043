#![allow(dead_code)]

pub use reflow_test_utils::init_tracing;
