//! Message handling - Event dispatch and the throttled outbound channel

pub mod dispatcher;
pub mod throttle;

pub use dispatcher::{DispatchReport, HandlerFailure, ListenerDispatcher};
pub use throttle::{Say, ThrottleConfig, ThrottledChannel};
