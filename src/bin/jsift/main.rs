//! Command-line driver: evaluate a query against a JSON file or stdin.

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "jsift")]
#[command(about = "Filter and reshape JSON documents with jq-style queries", long_about = None)]
#[command(version)]
struct Cli {
    /// Query expression, e.g. '.items[] | {n: .name}'
    query: String,

    /// Input file; '-' or absent reads standard input
    file: Option<PathBuf>,

    /// Print the parsed query tree instead of evaluating
    #[arg(long)]
    debug: bool,

    /// Print one result per line instead of a single JSON value
    #[arg(long)]
    list: bool,
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        eprintln!("jsift: {err:#}");
        process::exit(exit_code(&err));
    }
}

/// 1 for errors in the document, 2 for everything the caller got wrong:
/// bad query text, unreadable input, broken pipe.
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<jsift::Error>() {
        Some(jsift::Error::Malformed(_)) | Some(jsift::Error::Eval(_)) => 1,
        _ => 2,
    }
}

fn run(cli: &Cli) -> Result<()> {
    if cli.debug {
        let tree = jsift::parse(&cli.query).map_err(jsift::Error::Parse)?;
        print!("{}", tree.dump());
        return Ok(());
    }
    let input = open(cli.file.as_deref())?;
    if cli.list {
        let lines = jsift::evaluate_list(input, &cli.query)?;
        for line in lines {
            println!("{line}");
        }
    } else {
        let out = jsift::evaluate(input, &cli.query)?;
        println!("{out}");
    }
    Ok(())
}

fn open(path: Option<&std::path::Path>) -> Result<Box<dyn Read>> {
    match path {
        Some(p) if p.as_os_str() != "-" => {
            let file =
                File::open(p).with_context(|| format!("cannot open {}", p.display()))?;
            Ok(Box::new(file))
        }
        _ => Ok(Box::new(std::io::stdin())),
    }
}
