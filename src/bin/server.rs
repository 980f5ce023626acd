//! Parlor server binary for headless deployments.
//! Run with: cargo run --bin parlor-server

use std::process::ExitCode;

use parlor_agent::start_parlor_agent;

fn main() -> ExitCode {
    start_parlor_agent::run()
}
