mod adjustment;
mod health;
mod reading;

pub use adjustment::*;
pub use health::*;
pub use reading::*;
