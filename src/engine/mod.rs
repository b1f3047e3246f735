pub mod coverage;
pub mod explorer;
pub mod goal_runner;
pub mod history;
pub mod loop_control;
pub mod recovery;
pub mod state;
