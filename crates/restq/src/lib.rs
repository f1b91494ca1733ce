#![doc = include_str!("../README.md")]

mod coordinator;
mod error;
mod queue;
mod wait;
mod waiter;

pub use crate::coordinator::*;
pub use crate::error::*;
pub use crate::queue::{Enqueued, QueueStats};
pub use crate::waiter::*;
