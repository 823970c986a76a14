//! Request handlers.

pub mod health;
pub mod media;
pub mod tasks;
pub mod vlogs;

pub use health::{health, ready};
pub use media::{media_events, upload_media};
pub use tasks::{analyze_media_task, create_vlog_task};
pub use vlogs::{create_vlog, get_vlog, vlog_events};
