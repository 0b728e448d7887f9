pub mod engine;
pub mod history;
pub mod loop_control;
pub mod state;

pub use engine::CycleRunner;
pub use history::CycleHistory;
pub use loop_control::LoopController;
pub use state::{CycleOutcome, CycleRecord};
