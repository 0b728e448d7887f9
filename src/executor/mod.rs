pub mod directive;
pub mod dispatcher;
pub mod gate;
pub mod input;
pub mod keys;
pub mod parser;
pub mod safety;
pub mod selection;
pub mod signals;

use std::time::Duration;

pub use directive::{ActionDirective, ExecutionOutcome};
pub use dispatcher::ActionExecutor;
pub use gate::{ConfirmationGate, ConfirmationSource, GateState};
pub use input::DeviceControl;

/// Blocking pause, injectable so tests can observe pacing without waiting.
pub type Sleeper = Box<dyn Fn(Duration) + Send>;

pub fn thread_sleeper() -> Sleeper {
    Box::new(std::thread::sleep)
}
