//! Front-end boundary: modal notifications and the terminal renderer

pub mod notification;
pub mod terminal;

pub use notification::{Notification, NotificationKind};
pub use terminal::TerminalView;
