mod gateway;
mod nest_gateway;
mod notification_service;
mod simulated_gateway;
mod telemetry_service;

pub use gateway::*;
pub use nest_gateway::*;
pub use notification_service::*;
pub use simulated_gateway::*;
pub use telemetry_service::*;
