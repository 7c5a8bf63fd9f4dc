//! Ownership of the single camera handle.
//!
//! Every open, configure and close runs in order on one worker task, so a
//! facing swap can never hold two cameras at once and a pause always waits for
//! an in-flight open to finish before releasing it.

mod manager;
mod state;
mod worker;


pub use manager::ResourceLifecycleManager;
pub use state::HandleState;
