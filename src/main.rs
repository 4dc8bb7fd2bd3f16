use std::{
    env::args,
    fs::read_to_string,
    io::{self, BufRead, Write},
    process::exit,
};

use glang::{logger, VM};

fn main() {
    if let Err(e) = logger::init() {
        eprintln!("could not install logger: {}", e);
    }

    let args: Vec<String> = args().collect();

    let result = match args.len() {
        1 => repl(),
        2 => run_file(&args[1]),
        _ => {
            eprintln!("Usage: glang [path]");
            exit(64);
        }
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        exit(74);
    }
}

/// One VM for the whole session, so globals carry over between lines.
fn repl() -> io::Result<()> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut buf = String::new();
    let mut vm = VM::new();

    loop {
        print!("> ");
        io::stdout().flush()?;

        buf.clear();
        if input.read_line(&mut buf)? == 0 {
            println!();
            return Ok(());
        }

        if buf == "\n" {
            println!("goodbye");
            return Ok(());
        }

        if let Err(e) = vm.interpret(&buf) {
            eprintln!("{}", e);
        }
    }
}

fn run_file(path: &str) -> io::Result<()> {
    let source = match read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Could not read file \"{}\": {}", path, e);
            exit(74);
        }
    };

    let mut vm = VM::new();
    if let Err(e) = vm.interpret(&source) {
        eprintln!("{}", e);
        exit(e.exit_code());
    }

    Ok(())
}
