use std::io::{self, Read};
use std::process::ExitCode;

use log::info;
use tomasulo_rv32i::Simulator;

fn main() -> ExitCode {
    env_logger::init();

    let mut input = String::new();
    if let Err(err) = io::stdin().read_to_string(&mut input) {
        eprintln!("failed to read memory image from stdin: {err}");
        return ExitCode::FAILURE;
    }

    let mut simulator = match Simulator::from_image(io::Cursor::new(input)) {
        Ok(sim) => sim,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    info!("memory image loaded, starting execution at pc=0x00000000");

    match simulator.run() {
        Ok(result) => {
            println!("{result}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
