pub mod config;
pub mod cycle;
pub mod error;

pub use config::{
    Config, CycleConfig, ProcessConfig, StoreConfig, TriggerConfig, MAX_REMINDER_DAYS,
};
pub use cycle::CycleMonth;
pub use error::*;
