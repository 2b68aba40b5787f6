mod adjustment;
mod event;

pub use adjustment::AdjustmentRepository;
pub use event::EventRepository;
