//! All code related to command line argument parsing.

// We allow missing documentation for this module, as any documentation put on
// the cli struct will appear in the help message which, in most cases, is not
// what we want.
#![allow(
	missing_docs,
	clippy::missing_docs_in_private_items,
	unused_qualifications
)]

use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Opts {
	#[command(flatten)]
	pub shared: Shared,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Args)]
#[command(
	group(
		ArgGroup::new("verbosity")
			.required(false)
			.args(["verbose", "quite"]),
	)
)]
pub struct Shared {
	/// Runs with specified level of verbosity which affects the log level.
	///
	/// The level can be set by repeating the flag `n` times (e.g. `-vv` for 2).
	/// Levels:
	///     1 - `Info`;
	///     2 - `Debug`;
	///     3 - `Trace`.
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Quite mode
	///
	/// Will only print errors
	#[arg(short, long)]
	pub quite: bool,
}

#[derive(Debug, Args)]
pub struct OutputShared {
	/// Writes the execution result as json to the given path.
	#[arg(long)]
	pub json_output: Option<PathBuf>,

	/// Writes the execution result as yaml to the given path.
	#[arg(long)]
	pub yaml_output: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	Link(Link),
	Provision(Provision),
	Unlink(Unlink),
	Deprovision(Deprovision),
	Status(Status),
	Init(Init),
	Fill(Fill),
	Adopt(Adopt),
	Man(Man),
	Completions(Completions),
}

/// Shared options every pack-selecting command takes.
#[derive(Debug, Args)]
pub struct PackShared {
	/// The dotfiles root containing one directory per pack.
	#[arg(long, env = super::DOTFILES_ROOT_ENVVAR)]
	pub dotfiles_root: PathBuf,

	/// Datastore root (defaults to `$XDG_DATA_HOME/packline`).
	#[arg(long, env = super::DODOT_DATA_DIR_ENVVAR)]
	pub data_dir: Option<PathBuf>,

	/// Restrict the command to these packs (may be repeated). Defaults
	/// to every discovered pack.
	#[arg(long = "pack")]
	pub packs: Vec<String>,
}

/// Deploys configuration-category handler actions (link, shell, PATH)
/// for the selected packs.
#[derive(Debug, Parser)]
pub struct Link {
	#[command(flatten)]
	pub shared: PackShared,

	/// Plans the deployment without mutating the filesystem.
	#[arg(long)]
	pub dry_run: bool,

	/// Proceed through conflicts (last-write-wins at the filesystem
	/// level) instead of stopping at them.
	#[arg(long)]
	pub force: bool,

	#[command(flatten)]
	pub output: OutputShared,
}

/// Runs provisioning actions (install scripts, Homebrew bundles) for the
/// selected packs, gated by the sentinel unless `--provision-rerun`.
#[derive(Debug, Parser)]
pub struct Provision {
	#[command(flatten)]
	pub shared: PackShared,

	#[arg(long)]
	pub dry_run: bool,

	#[arg(long)]
	pub force: bool,

	/// Skip the sentinel check and clear existing sentinels for the
	/// selected packs first.
	#[arg(long)]
	pub provision_rerun: bool,

	/// Don't present provisioning confirmation prompts; decline all of
	/// them.
	#[arg(long)]
	pub no_provision: bool,

	#[command(flatten)]
	pub output: OutputShared,
}

/// Removes link/shell/PATH datastore state for the selected packs.
#[derive(Debug, Parser)]
pub struct Unlink {
	#[command(flatten)]
	pub shared: PackShared,

	#[arg(long)]
	pub dry_run: bool,
}

/// Removes provisioning datastore state for the selected packs.
#[derive(Debug, Parser)]
pub struct Deprovision {
	#[command(flatten)]
	pub shared: PackShared,

	#[arg(long)]
	pub dry_run: bool,
}

/// Reports per-pack deployment status without mutating anything.
#[derive(Debug, Parser)]
pub struct Status {
	#[command(flatten)]
	pub shared: PackShared,

	#[command(flatten)]
	pub output: OutputShared,
}

/// Creates a new pack directory with seeded template files.
#[derive(Debug, Parser)]
pub struct Init {
	#[command(flatten)]
	pub shared: PackShared,

	/// Name of the new pack.
	pub name: String,
}

/// Writes any template files missing from an existing pack.
#[derive(Debug, Parser)]
pub struct Fill {
	#[command(flatten)]
	pub shared: PackShared,

	/// Name of the pack to fill.
	pub name: String,
}

/// Moves a real file into a pack, then links it back to its original
/// location.
#[derive(Debug, Parser)]
pub struct Adopt {
	#[command(flatten)]
	pub shared: PackShared,

	/// Name of the pack to adopt into.
	pub name: String,

	/// Path (inside the user's home) of the file to adopt.
	pub file: PathBuf,
}

/// Generates man pages for this application.
#[derive(Debug, Parser)]
pub struct Man {
	/// Output path for the man pages.
	#[arg(short, long, default_value = ".")]
	pub output: PathBuf,
}

/// Generates shell completions for this application.
#[derive(Debug, Parser)]
pub struct Completions {
	/// Shell for which to generate the completions.
	pub shell: Shell,

	/// Output path for the completions.
	#[arg(short, long, default_value = ".")]
	pub output: PathBuf,
}
