#![forbid(unsafe_code)]

//! Event bus and stream signals for the brook loading pipeline.

mod bus;
mod event;

pub use bus::EventBus;
pub use event::StreamEvent;
