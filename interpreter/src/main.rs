use std::cell::RefCell;
use std::io::{self, BufRead, Write};
use std::process;
use std::rc::Rc;
use std::{env, fs};

use losk_interpreter::{exit_code, Error, Session};

const EX_USAGE: i32 = 64;
const EX_IOERR: i32 = 74;

/// Tracing output goes to stderr and is only set up when `RUST_LOG` is present, e.g.
/// `RUST_LOG=losk_interpreter=trace losk script.lox` to follow every call.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if env::var("RUST_LOG").is_ok() {
        let filter = EnvFilter::from_default_env();
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(io::stderr)
                    .with_target(true)
                    .with_level(true),
            )
            .with(filter)
            .init();
    }
}

fn main() {
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let code = match args.as_slice() {
        [] => run_prompt(),
        [path] => run_file(path),
        _ => {
            eprintln!("Usage: losk [script]");
            EX_USAGE
        }
    };

    process::exit(code);
}

fn report(errors: &[Error]) {
    for err in errors {
        eprintln!("{}", err);
    }
}

fn run_file(path: &str) -> i32 {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("Could not read '{}': {}", path, err);
            return EX_IOERR;
        }
    };

    let src = String::from_utf8_lossy(&bytes);
    let mut session = Session::new(Rc::new(RefCell::new(io::stdout())));
    match session.run(&src) {
        Ok(()) => 0,
        Err(errors) => {
            report(&errors);
            exit_code(&errors)
        }
    }
}

// Every line is its own program, sharing the globals of the ones before it. Errors are reported
// and the prompt keeps going; end of input leaves with status 0.
fn run_prompt() -> i32 {
    let mut session = Session::new(Rc::new(RefCell::new(io::stdout())));
    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            return EX_IOERR;
        }

        line.clear();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => return 0,
            Ok(_) => {
                if let Err(errors) = session.run(&line) {
                    report(&errors);
                }
            }
            Err(err) => {
                eprintln!("{}", err);
                return EX_IOERR;
            }
        }
    }
}
