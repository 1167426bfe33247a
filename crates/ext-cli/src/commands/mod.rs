//! Command implementations for ext-cli

pub mod check;
pub mod completions;
pub mod credits;
pub mod load;
pub mod resolve;

pub use check::run_check;
pub use completions::run_completions;
pub use credits::run_credits;
pub use load::run_load;
pub use resolve::run_resolve;
