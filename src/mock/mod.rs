//! Test doubles for the pipeline's external seams.

pub mod agent;

pub use agent::{MockAgent, ScriptedCall};
