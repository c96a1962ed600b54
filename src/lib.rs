pub mod actuator;
pub mod classifier;
pub mod coach;
pub mod config;
pub mod feedback;
pub mod guard;
pub mod pipeline;
pub mod pose;
pub mod protocol;
pub mod source;
