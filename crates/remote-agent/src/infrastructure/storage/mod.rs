//! Persistent storage for the agent.

pub mod config;
