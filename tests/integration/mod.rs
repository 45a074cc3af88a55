//! Integration tests for stepgen generation runs

mod cli_commands;
mod config_integration;
mod orchestrator_run;
