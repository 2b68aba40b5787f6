pub mod schema;
pub mod settings;
pub mod storage;

pub use schema::SchemaManager;
pub use settings::{
    Control, Database, Device, ErrorCountMode, Logger, Notification, Retry, Server, Settings,
};
pub use storage::Storage;
