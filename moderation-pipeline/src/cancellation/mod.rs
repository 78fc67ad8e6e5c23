//! Cooperative cancellation for in-flight pipelines.
//!
//! A single [`CancellationToken`] is shared by every pipeline started from
//! the same spawner. Cancelling it stops runs at their next sleep point.

mod token;

pub use token::CancellationToken;
