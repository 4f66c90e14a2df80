#![allow(clippy::print_stderr)]

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::Path;

use ilc::cli::args::{CliArgs, OutputFormat};
use ilc::cli::{driver, reporter::Reporter};

const EXIT_SUCCESS: i32 = 0;
const EXIT_DIAGNOSTICS: i32 = 1;

fn main() -> Result<()> {
    // Tracing is only installed when ILC_LOG or RUST_LOG is set.
    // ILC_LOG_FORMAT=tree|json|text picks the layer (see src/tracing_config.rs).
    ilc::tracing_config::init_tracing();

    let args = CliArgs::parse();
    let cwd = std::env::current_dir().context("failed to resolve current directory")?;

    if args.show_config {
        return handle_show_config(&args, &cwd);
    }

    let run = driver::run(&args, &cwd)?;

    match args.format {
        OutputFormat::Json => {
            let json = if args.pretty {
                serde_json::to_string_pretty(&run)
            } else {
                serde_json::to_string(&run)
            }
            .context("failed to serialize lowering report")?;
            println!("{json}");
        }
        OutputFormat::Text => {
            let color = !args.no_color && std::io::stdout().is_terminal();
            print!("{}", Reporter::new(color).render(&run));
        }
    }

    let status = if run.has_errors() {
        EXIT_DIAGNOSTICS
    } else {
        EXIT_SUCCESS
    };
    if status != EXIT_SUCCESS {
        std::process::exit(status);
    }
    Ok(())
}

fn handle_show_config(args: &CliArgs, cwd: &Path) -> Result<()> {
    let (options, units) = driver::resolve_inputs(args, cwd)?;
    let units: Vec<String> = units.iter().map(|u| u.display().to_string()).collect();
    let shown = serde_json::json!({
        "loweringOptions": options,
        "units": units,
    });
    let json = serde_json::to_string_pretty(&shown).context("failed to serialize configuration")?;
    println!("{json}");
    Ok(())
}
