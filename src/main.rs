use std::path::PathBuf;
use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use jvm_model::{Bytecode, Suite};
use debloat::Debloater;

mod analyze;
mod dynamic;

/// Predicts which outcomes a java method can have, and deletes the source
/// lines no outcome ever needs.
#[derive(Parser)]
#[command(name = "jinx", version)]
struct Cli {
	/// Log debug output to stderr.
	#[arg(short, long, global = true)]
	verbose: bool,

	/// The suite work folder.
	#[arg(long, global = true, default_value = ".")]
	workdir: PathBuf,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	/// Print the tool description block.
	Info,
	/// Predict the possible outcomes of one method.
	Analyze {
		/// An absolute method id, `pkg/Cls.name:(args)ret`.
		method: String,
		/// The abstract domain to analyze with.
		#[arg(long, value_enum, default_value = "signs")]
		domain: DomainChoice,
	},
	/// Run one method concretely on inputs mined from its source and
	/// wager on the tally.
	Dynamic {
		/// An absolute method id, `pkg/Cls.name:(args)ret`.
		method: String,
	},
	/// Rewrite the suite's sources without their provably dead lines.
	Debloat {
		/// Only methods whose id contains this string.
		#[arg(long)]
		filter: Option<String>,
		/// Where the rewritten tree and the analysis artifacts go.
		#[arg(long, default_value = "debloated")]
		target: PathBuf,
	},
	/// Check the layout of the suite work folder.
	Checkhealth,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum DomainChoice {
	Signs,
	Interval,
	Words,
	Floats,
	Strings,
	Boxes,
}

fn setup_logger(verbose: bool) -> Result<()> {
	let level = if verbose {
		log::LevelFilter::Debug
	} else {
		log::LevelFilter::Warn
	};
	fern::Dispatch::new()
		.format(|out, message, record| {
			out.finish(format_args!("[{}] {}", record.level(), message))
		})
		.level(level)
		.chain(std::io::stderr())
		.apply()?;
	Ok(())
}

fn main() -> Result<()> {
	let cli = Cli::parse();
	setup_logger(cli.verbose)?;

	let suite = Suite::new(&cli.workdir);

	match cli.command {
		Command::Info => {
			analyze::print_info();
			Ok(())
		},
		Command::Analyze { method, domain } => analyze::analyze(&suite, &method, domain),
		Command::Dynamic { method } => dynamic::dynamic(&suite, &method),
		Command::Debloat { filter, target } => {
			let bytecode = Bytecode::new(suite.clone());
			let reports = Debloater::new(&suite, &bytecode, target).run(filter.as_deref())?;

			for report in &reports {
				if report.success {
					println!("{}: removed {} lines", report.method, report.lines_removed.len());
				} else {
					println!(
						"{}: failed ({})",
						report.method,
						report.error.as_deref().unwrap_or("unknown error"),
					);
				}
			}
			Ok(())
		},
		Command::Checkhealth => {
			suite.checkhealth()?;
			println!("ok");
			Ok(())
		},
	}
}
