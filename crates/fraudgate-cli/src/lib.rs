//! Command implementations behind the `fraudgate` binary.
pub mod monitor;
pub mod registry;
pub mod retrain;
pub mod score;
pub mod train;
pub mod util;
