//! Entrypoint for CLI
mod bell;
mod config;
mod error;

use std::{env, error::Error, fs, time::Instant};

use chip8::{prelude::*, IMPL_VERSION};
use log::{debug, error, info, LevelFilter};

use self::{bell::Bell, config::RunConf, error::CliError};

static USAGE: &str = r#"
usage: chip8 CMD FILE [CONFIG]

commands:
    run     Run the target ROM file without a window, then print the display
    dis     Disassemble the target ROM into readable assembly

examples:
    chip8 run breakout.rom
    chip8 run breakout.rom breakout.yaml
    chip8 dis breakout.rom

Log level is controlled by the RUST_LOG environment variable.
"#;

fn run_bytecode(filepath: &str, config: Option<&str>) -> Result<(), CliError> {
    let conf = match config {
        Some(path) => RunConf::from_file(path)?,
        None => RunConf::default(),
    };

    info!("load rom: {filepath}");
    let bytecode = fs::read(filepath)?;

    let mut vm = Chip8Vm::new(conf.vm.clone());
    vm.load_bytecode(bytecode.as_slice())?;
    if conf.bell {
        vm.set_buzzer(Bell);
    }

    let keys = conf.key_state();
    vm.set_keys(&keys);
    let held = vm.dump_keys()?;
    if !held.is_empty() {
        debug!("{held}");
    }

    let mut clock = Clock::new(conf.clock_frequency);
    let mut frames = 0_usize;
    let mut steps = 0_usize;
    let start = Instant::now();

    while steps < conf.steps {
        clock.wait();
        vm.set_keys(&keys);

        match vm.step() {
            Ok(_) => {}
            Err(err) => {
                error!("{err}");
                let pc = vm.pc() as usize;
                error!("memory around fault:\n{}", vm.dump_ram(pc.saturating_sub(4), 10)?);
                break;
            }
        }

        if vm.take_redraw() {
            frames += 1;
        }
        steps += 1;
    }

    info!(
        "ran {steps} steps, {frames} frames, in {}ms",
        start.elapsed().as_nanos() as f64 / 1_000_000.0
    );
    println!("{}", vm.dump_display()?);

    match vm.fault() {
        Some(err) => Err(err.clone().into()),
        None => Ok(()),
    }
}

fn run_disassembler(filepath: &str) -> Result<(), CliError> {
    info!("disassemble: {filepath}");

    let bytecode = fs::read(filepath)?;
    Disassembler::new(bytecode.as_slice()).print_bytecode()?;

    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    simple_logger::SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()?;

    let result = match parse_args() {
        Some(Cmd::Run { filepath, config }) => run_bytecode(&filepath, config.as_deref()),
        Some(Cmd::Dis { filepath }) => run_disassembler(&filepath),
        None => {
            print_usage();
            // FreeBSD EX_USAGE (64)
            std::process::exit(64)
        }
    };

    if let Err(err) = result {
        error!("{err}");
        std::process::exit(1);
    }

    Ok(())
}

fn parse_args() -> Option<Cmd> {
    let mut args = env::args().skip(1);
    match args.next() {
        Some(cmd) => {
            // don't format me T.T
            match cmd.as_str() {
                "run" => Some(Cmd::Run {
                    filepath: args.next()?,
                    config: args.next(),
                }),
                "dis" => Some(Cmd::Dis {
                    filepath: args.next()?,
                }),
                _ => None,
            }
        }
        None => None,
    }
}

fn print_usage() {
    println!("Chip8 v{IMPL_VERSION}");
    println!("{USAGE}");
}

enum Cmd {
    /// Run file
    Run {
        filepath: String,
        config: Option<String>,
    },
    /// Disassemble
    Dis { filepath: String },
}
