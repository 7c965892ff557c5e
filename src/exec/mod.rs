// src/exec/mod.rs

//! Process execution layer.
//!
//! Turns shell commands from a graph config file into task actions, using
//! `tokio::process::Command`. The scheduler itself never spawns processes;
//! it only calls the actions built here.

pub mod command;

pub use command::command_action;
