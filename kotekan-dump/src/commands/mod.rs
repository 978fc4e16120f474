//! Command handlers -- one module per subcommand

pub mod show;
pub mod summary;
