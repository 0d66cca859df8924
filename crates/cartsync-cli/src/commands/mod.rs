pub mod backup;
pub mod cache;
pub mod common;
pub mod queue;
pub mod sync;
