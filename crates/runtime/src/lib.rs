pub mod diagnostics;
pub mod event_bus;
pub mod lifecycle;
pub mod logging;
pub mod metrics;
pub mod throttle;

pub use diagnostics::*;
pub use event_bus::*;
pub use lifecycle::*;
pub use metrics::*;
pub use throttle::*;
