pub mod coordinator;
pub mod dispatcher;
pub mod resolver;
pub mod safety;
