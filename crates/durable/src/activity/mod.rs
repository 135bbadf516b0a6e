//! Activity abstractions
//!
//! Activities are units of work invoked by workflow steps. They:
//! - Are registered by name in an [`ActivityRegistry`]
//! - Report results only through the value they return
//! - Can observe cooperative cancellation via their [`ActivityContext`]

mod context;
mod definition;
mod registry;

pub use context::{ActivityContext, CancellationHandle};
pub use definition::{error_types, Activity, ActivityError};
pub use registry::{ActivityHandler, ActivityRegistry, ActivityResult};
