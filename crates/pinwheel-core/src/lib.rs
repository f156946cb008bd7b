pub mod config;
pub mod event;
pub mod types;

pub use config::PinwheelConfig;
pub use event::{EventError, PackagePublishedEvent, PublishNotice};
pub use types::*;
