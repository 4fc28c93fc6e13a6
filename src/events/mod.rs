//! Session event distribution
//!
//! - `Event` - transient session event envelope
//! - `EventBus` - non-blocking publish/subscribe fan-out
//! - `Subscription` - bounded receive-only queue

mod bus;
mod types;

pub use bus::*;
pub use types::*;
