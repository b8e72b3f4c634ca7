//! An elaborator and proof checker for a dependently-typed lambda calculus
//! with explicit universe levels.

use nivelo::fmt::pretty;
use nivelo::{check, Symbols};
use std::io::{self, Read};
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
/// An elaborator and proof checker for a dependently-typed lambda calculus
/// with explicit universe levels
struct Opt {
    /// Print the registry after a successful run
    #[structopt(long)]
    dump: bool,

    /// Maximum number of solver iterations per file
    #[structopt(long, default_value = "100")]
    max_iterations: usize,

    /// Files to process (cumulative)
    ///
    /// To read from standard input, use "-" as file name.
    #[structopt(name = "FILE", required = true)]
    files: Vec<PathBuf>,
}

fn read(file: &PathBuf) -> io::Result<String> {
    if file.to_str() == Some("-") {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        std::fs::read_to_string(file)
    }
}

fn dump(syms: &Symbols) {
    for (s, e) in syms.iter() {
        if e.local {
            continue;
        }
        let path = syms.path(s);
        if let Some(typ) = &e.info.typ {
            println!("{} : {}", path, pretty(typ, syms));
        }
        if let Some(value) = &e.info.value {
            println!("{} = {}", path, pretty(value, syms));
        }
        for rule in &e.info.rules {
            println!("{} := {}", pretty(&rule.lhs, syms), pretty(&rule.rhs, syms));
        }
    }
}

fn main() -> io::Result<()> {
    // allow setting the logging level via the environment variable "LOG",
    // e.g. `LOG=trace nivelo ...`
    pretty_env_logger::init_custom_env("LOG");

    let opt = Opt::from_args();
    let mut syms = Symbols::prelude();
    let mut failed = false;

    for file in &opt.files {
        let src = read(file)?;
        let out = check(&src, &mut syms, opt.max_iterations);
        for msg in &out.messages {
            println!("{}: {}", file.display(), msg);
        }
        failed |= !out.is_ok();
    }

    if failed {
        std::process::exit(1);
    }
    if opt.dump {
        dump(&syms);
    }
    Ok(())
}
