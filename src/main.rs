//! Binary entrypoint that launches the Parlor agent server.

use std::process::ExitCode;

use parlor_agent::start_parlor_agent;

fn main() -> ExitCode {
    start_parlor_agent::run()
}
