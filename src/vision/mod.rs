pub mod client;
pub mod observation;
pub mod prompt;
