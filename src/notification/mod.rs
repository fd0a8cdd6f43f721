pub mod dispatcher;
pub mod models;

pub use dispatcher::{LoggingDispatcher, NotificationDispatcher};
pub use models::{NotificationIntent, NotificationKind};
