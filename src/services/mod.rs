pub mod annotate;
pub mod detector;
pub mod executor;
pub mod inference;
pub mod queue;
pub mod storage;
pub mod worker;
