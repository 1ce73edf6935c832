pub mod accounts;
pub mod analysis;
pub mod games;
pub mod jobs;
pub mod pool;
pub mod progress;
pub mod usage;
