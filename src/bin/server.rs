//! chatline server binary.
//! Run with: cargo run --bin chatline-server

use std::process::ExitCode;

use chatline::start_chatline;

fn main() -> ExitCode {
    start_chatline::run()
}
