use clap::Parser;
use parallax_cli::{exit_code, init_logging, run, Args};
use std::process::ExitCode;
use std::time::Instant;

fn main() -> ExitCode {
    init_logging();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            // help and version go to stdout and succeed; usage errors share the config exit code
            return if e.use_stderr() { ExitCode::from(1) } else { ExitCode::SUCCESS };
        }
    };

    let t0 = Instant::now();
    match run(&args) {
        Ok(dest) => {
            println!("Combined image saved at {} ({:.2?})", dest.display(), t0.elapsed());
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}
