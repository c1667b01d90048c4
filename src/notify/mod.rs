pub mod engine;
pub mod transport;

pub use engine::{NotificationEngine, NotificationState};
pub use transport::{DesktopTransport, InAppTransport, NotificationTransport, Notifier};
