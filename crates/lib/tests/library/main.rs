mod common;

mod analyze_tests;
mod cache_tests;
mod deps_tests;
mod extract_tests;
mod pipeline_tests;
mod reduce_tests;
