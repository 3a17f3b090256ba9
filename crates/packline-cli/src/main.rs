//! packline - A cross-platform dotfiles deployment engine
//!
//! ## What is packline?
//!
//! packline materializes a dotfiles repository ("packs", one directory
//! per application) into a live home environment: files are symlinked,
//! sourced by your shell, prepended to `PATH`, or run once as
//! provisioners (install scripts, Homebrew bundles). Re-running any
//! command is idempotent.
//!
//! ## Usage
//!
//! ```sh
//! # deploy every pack under the dotfiles root
//! packline --dotfiles-root ~/dotfiles link
//!
//! # deploy a subset
//! packline --dotfiles-root ~/dotfiles link --pack vim --pack zsh
//!
//! # run install scripts / Homebrew bundles once, gated by a checksum sentinel
//! packline --dotfiles-root ~/dotfiles provision
//! ```
//!
//! We recommend setting the `DOTFILES_ROOT` environment variable so
//! that packs can be deployed with just `packline link`.
//!
//! ### Dotfiles Root
//!
//! packline resolves the dotfiles root in the following order:
//!
//! 1. CLI argument `--dotfiles-root`
//! 2. Environment variable `DOTFILES_ROOT`
//!
//! The dotfiles root contains one directory per pack:
//!
//! ```ls
//! + vim
//!     + vimrc
//! + zsh
//!     + aliases.sh
//!     + .dodot.toml
//! + tools
//!     + bin
//!         + my-script
//! ```
//!
//! ### Datastore
//!
//! packline keeps its own state - intermediate symlinks, provisioning
//! sentinels, shell/PATH fragments - under a datastore root, resolved
//! from `--data-dir`, `DODOT_DATA_DIR`, or `$XDG_DATA_HOME/packline`.

#![allow(rustdoc::private_intra_doc_links)]
#![deny(
	dead_code,
	deprecated_in_future,
	exported_private_dependencies,
	future_incompatible,
	missing_copy_implementations,
	rustdoc::missing_crate_level_docs,
	rustdoc::broken_intra_doc_links,
	missing_docs,
	clippy::missing_docs_in_private_items,
	missing_debug_implementations,
	private_in_public,
	rust_2018_compatibility,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unsafe_code,
	unstable_features,
	unused_import_braces,
	unused_qualifications,

	// clippy attributes
	clippy::missing_const_for_fn,
	clippy::redundant_pub_crate,
	clippy::use_self
)]
#![cfg_attr(docsrs, feature(doc_cfg), feature(doc_alias))]

mod command;
mod opt;
mod util;

use clap::{CommandFactory, Parser};
use color_eyre::Result;

/// Name of this binary.
const BINARY_NAME: &str = env!("CARGO_BIN_NAME");

/// Name of the environment variable which defines the default dotfiles
/// root for `packline`.
pub const DOTFILES_ROOT_ENVVAR: &str = "DOTFILES_ROOT";

/// Name of the environment variable which defines the default datastore
/// root for `packline`.
pub const DODOT_DATA_DIR_ENVVAR: &str = "DODOT_DATA_DIR";

/// Entry point for `packline`.
fn main() -> Result<()> {
	color_eyre::install()?;

	let opts = opt::Opts::parse();

	let log_level = if opts.shared.quite {
		log::Level::Error
	} else {
		match opts.shared.verbose {
			// Default if no value for `verbose` is given
			0 => log::Level::Warn,
			1 => log::Level::Info,
			2 => log::Level::Debug,
			_ => log::Level::Trace,
		}
	};

	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level.as_str())).init();

	log::debug!("Parsed Opts:\n{:#?}", opts);

	match handle_commands(opts) {
		Ok(code) => std::process::exit(code),
		Err(report) => {
			eprintln!("{report:?}");
			std::process::exit(4);
		}
	}
}

/// Gets the parsed command line arguments and dispatches to the
/// matching command handler, returning the process exit code.
fn handle_commands(opts: opt::Opts) -> Result<i32> {
	let opt::Opts { shared: _, command } = opts;

	match command {
		opt::Command::Link(c) => command::link(c),
		opt::Command::Provision(c) => command::provision(c),
		opt::Command::Unlink(c) => command::unlink(c),
		opt::Command::Deprovision(c) => command::deprovision(c),
		opt::Command::Status(c) => command::status(c),
		opt::Command::Init(c) => command::init(c),
		opt::Command::Fill(c) => command::fill(c),
		opt::Command::Adopt(c) => command::adopt(c),
		opt::Command::Man(c) => handle_command_man(c),
		opt::Command::Completions(c) => handle_command_completions(c),
	}
}

/// Handles the `man` command processing.
fn handle_command_man(opt::Man { output }: opt::Man) -> Result<i32> {
	let path = output.join(format!("{BINARY_NAME}.1"));

	let man = clap_mangen::Man::new(opt::Opts::command());
	let mut buffer: Vec<u8> = Default::default();
	man.render(&mut buffer)?;

	std::fs::write(path, buffer)?;

	Ok(0)
}

/// Handles the `completions` command processing.
fn handle_command_completions(opt::Completions { shell, output }: opt::Completions) -> Result<i32> {
	clap_complete::generate_to(shell, &mut opt::Opts::command(), BINARY_NAME, output)?;

	Ok(0)
}
