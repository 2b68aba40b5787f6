pub mod models;

pub use models::*;

/// Degrees Fahrenheit, the unit every setpoint and reading is expressed in.
pub type Fahrenheit = f64;
