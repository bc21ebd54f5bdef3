// Import necessary modules and dependencies
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{ErrorLevel, Verbosity};

// Define the command-line interface using the clap crate
#[derive(Parser, Debug)]
#[command(
	author, // Set the author
	version, // Set the version
	about, // Set a short description
	long_about = None, // Disable long description
	propagate_version = true, // Enable version flag for subcommands
	disable_help_subcommand = true, // Disable help subcommand
)]
struct Cli {
	#[command(subcommand)]
	command: Commands, // Set subcommands

	#[command(flatten)]
	verbose: Verbosity<ErrorLevel>, // Set verbosity flag
}

// Define subcommands for the command-line interface
#[derive(Subcommand, Debug)]
enum Commands {
	/// Decode or encode tile addresses
	Params(tools::params::Subcommand),

	/// Summarise a format description
	Desc(tools::desc::Subcommand),

	/// Decode a tile and list its features and strings
	Tile(tools::tile::Subcommand),

	/// List the tile addresses covering a viewport
	Cover(tools::cover::Subcommand),
}

// Main function for running the command-line interface
fn main() -> Result<()> {
	let cli = Cli::parse();

	// Initialize logger and set log level based on verbosity flag
	env_logger::Builder::new()
		.filter_level(cli.verbose.log_level_filter())
		.format_timestamp(None)
		.init();

	run(cli)
}

// Helper function for running subcommands
fn run(cli: Cli) -> Result<()> {
	match &cli.command {
		Commands::Params(arguments) => tools::params::run(arguments),
		Commands::Desc(arguments) => tools::desc::run(arguments),
		Commands::Tile(arguments) => tools::tile::run(arguments),
		Commands::Cover(arguments) => tools::cover::run(arguments),
	}
}
