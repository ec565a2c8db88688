//! Entrypoint for CLI.
use std::{env, fs, process};

use log::info;

use pl0::{io::StdIo, pcode::Instruction, vm::Pl0Vm, IMPL_VERSION};
use pl0_compiler::compile;

static USAGE: &str = r#"
usage: pl0 FILE [options]

Compiles the PL/0 source FILE to P-Code and runs it. Program output goes
to stdout, diagnostics go to stderr.

options:
    --show-code    Print the generated instruction listing before running

exit codes:
    0  success
    1  compile-time error
    2  runtime error
    3  could not read the source file
"#;

struct Opts {
    path: String,
    show_code: bool,
}

fn main() {
    simple_logger::SimpleLogger::new().env().init().unwrap();

    match parse_args() {
        Some(opts) => process::exit(run(opts)),
        None => {
            print_usage();
            // FreeBSD EX_USAGE (64)
            process::exit(64)
        }
    }
}

fn run(opts: Opts) -> i32 {
    let source = match fs::read_to_string(&opts.path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: cannot read '{}': {}", opts.path, err);
            return 3;
        }
    };

    info!("compiling '{}'", opts.path);
    let result = compile(&source);
    for diagnostic in &result.diagnostics {
        eprintln!("{}", diagnostic);
    }
    let Some(code) = result.code else {
        return 1;
    };

    if opts.show_code {
        dump_code(&code);
    }

    info!("running {} instructions", code.len());
    let mut vm = Pl0Vm::new(code, StdIo::new());
    match vm.run() {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{}", err);
            2
        }
    }
}

fn dump_code(code: &[Instruction]) {
    for (addr, instr) in code.iter().enumerate() {
        println!("{:4}: {}", addr, instr);
    }
}

fn parse_args() -> Option<Opts> {
    let mut path: Option<String> = None;
    let mut show_code = false;

    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--show-code" => show_code = true,
            "--help" | "-h" => return None,
            _ if arg.starts_with('-') => return None,
            _ => {
                // Exactly one positional argument: the source path.
                if path.replace(arg).is_some() {
                    return None;
                }
            }
        }
    }

    path.map(|path| Opts { path, show_code })
}

fn print_usage() {
    println!("pl0 v{}", IMPL_VERSION);
    println!("{}", USAGE);
}
