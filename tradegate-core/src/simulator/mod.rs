//! Position/Order Simulator — single-position, long-only fills with fees,
//! stop-loss triggers, pyramiding and equity tracking.

mod broker;
mod fees;

pub use broker::{
    EquityPoint, PositionSimulator, PyramidStopPolicy, SimulationOutput, SimulatorConfig,
};
pub use fees::FeeSchedule;
