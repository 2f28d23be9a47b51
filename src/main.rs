use std::env;
use std::io::{self, Read, Write};
use std::process::ExitCode;

use log::debug;
use markloom::{HtmlRenderer, Parser};

const USAGE: &str = "usage: markloom [--ast] < input.md";

fn main() -> ExitCode {
    env_logger::init();

    let mut ast = false;
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--ast" => ast = true,
            "-h" | "--help" => {
                println!("{USAGE}");
                return ExitCode::SUCCESS;
            }
            other => {
                eprintln!("unknown argument {other:?}\n{USAGE}");
                return ExitCode::from(2);
            }
        }
    }

    match run(ast) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("markloom: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run(ast: bool) -> io::Result<()> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;
    debug!("read {} bytes", input.len());
    let document = Parser::new().parse(&input);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if ast {
        serde_json::to_writer_pretty(&mut out, &document.to_tree(document.root()))?;
        writeln!(out)?;
    } else {
        HtmlRenderer::new().render_to(&document, &mut out)?;
    }
    out.flush()
}
