mod failures;
mod passthrough;
mod process_under_test;
mod reductions;
