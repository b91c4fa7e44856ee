pub mod config;
pub mod error;
pub mod types;

pub use config::ForgeConfig;
pub use types::{pick_stamp, InstanceId, ObjectId, Seed};
