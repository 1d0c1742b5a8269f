pub mod retry;
pub mod stats;
