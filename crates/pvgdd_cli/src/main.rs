#![allow(missing_docs)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pvgdd::gdd::PrimitiveType;

mod cmd;

#[derive(Parser)]
#[command(name = "pvgdd", about = "Tagged value registry, wire and flatten tools")]
struct Cli {
	/// Log debug events to stderr.
	#[arg(short, long, global = true)]
	verbose: bool,
	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// List the standard application types and prototype indices.
	Describe {
		#[arg(long)]
		json: bool,
	},
	/// Build a value and write its wire encoding.
	Encode {
		#[arg(long = "type", value_parser = cmd::util::parse_prim)]
		prim: PrimitiveType,
		#[arg(long, default_value = "value")]
		app: String,
		#[arg(long)]
		local: bool,
		#[arg(long)]
		now: bool,
		#[arg(long)]
		out: Option<PathBuf>,
		#[arg(required = true, allow_hyphen_values = true)]
		values: Vec<String>,
	},
	/// Read a wire buffer and print its header and values.
	Decode {
		path: PathBuf,
		#[arg(long)]
		local: bool,
		#[arg(long)]
		json: bool,
	},
	/// Flatten a standard prototype instance with offsets.
	Flatten {
		name: String,
		#[arg(long)]
		out: Option<PathBuf>,
		#[arg(long)]
		json: bool,
	},
	/// Materialise a flat buffer and print the tree.
	Unflatten {
		path: PathBuf,
		#[arg(long)]
		json: bool,
	},
}

fn main() {
	let cli = Cli::parse();
	init_tracing(cli.verbose);

	if let Err(err) = run(cli.command) {
		eprintln!("error: {err}");
		std::process::exit(1);
	}
}

fn init_tracing(verbose: bool) {
	let subscriber = tracing_subscriber::fmt()
		.with_max_level(if verbose { tracing::Level::DEBUG } else { tracing::Level::WARN })
		.with_writer(std::io::stderr)
		.finish();
	let _ = tracing::subscriber::set_global_default(subscriber);
}

fn run(command: Commands) -> pvgdd::gdd::Result<()> {
	match command {
		Commands::Describe { json } => cmd::describe::run(json),
		Commands::Encode {
			prim,
			app,
			local,
			now,
			out,
			values,
		} => cmd::encode::run(prim, app, local, now, out, values),
		Commands::Decode { path, local, json } => cmd::decode::run(path, local, json),
		Commands::Flatten { name, out, json } => cmd::flatten::run(name, out, json),
		Commands::Unflatten { path, json } => cmd::unflatten::run(path, json),
	}
}
