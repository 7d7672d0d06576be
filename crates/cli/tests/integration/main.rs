mod analyze_tests;
mod apply_tests;
mod common;
mod reduce_tests;
