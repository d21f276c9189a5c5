mod compare;
mod diff;
mod serve;

pub use compare::run_compare;
pub use diff::run_diff;
pub use serve::run_serve;
