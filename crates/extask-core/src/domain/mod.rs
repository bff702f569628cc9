//! Domain model: claims, variables, and outcomes.

mod outcome;
mod task;
mod variables;

pub use outcome::Outcome;
pub use task::TaskClaim;
pub use variables::{Value, Variables};
