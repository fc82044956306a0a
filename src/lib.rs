pub mod cli;
pub mod config;
pub mod fetch;
pub mod history;
pub mod process;
pub mod report;
