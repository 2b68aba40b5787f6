mod adjustment_handle;
mod event_handle;
mod health_handle;
mod reading_handle;

pub use adjustment_handle::*;
pub use event_handle::*;
pub use health_handle::*;
pub use reading_handle::*;
