//! The datastore (C8): the engine's exclusive write surface for
//! persisted state — managed symlinks, sentinels, and shell/PATH
//! fragments.

use std::io;
use std::path::{Path, PathBuf};

use crate::action::ProvisionKind;
use crate::provision::sentinel_path;

/// Subdirectory of `$DATA` holding intermediate symlinks.
pub const DEPLOYED_SYMLINK_DIR: &str = "deployed/symlink";

/// Shell-init fragment, sourced by the user's shell at startup.
pub const SHELL_INIT_FILE: &str = "shell/init.sh";

/// Directory holding one PATH marker file per pack.
pub const SHELL_PATH_DIR: &str = "shell/path";

/// Directory holding one shell-source marker file per pack.
pub const SHELL_SOURCE_DIR: &str = "shell/source";

/// Resolves the default datastore root: `$XDG_DATA_HOME/packline` or
/// `~/.local/share/packline`, unless overridden.
pub fn default_root() -> color_eyre::Result<PathBuf> {
	let dirs = directories::ProjectDirs::from("dev", "packline", "packline")
		.ok_or_else(|| color_eyre::eyre::eyre!("could not determine a home directory for the datastore root"))?;

	Ok(dirs.data_dir().to_path_buf())
}

/// The engine-owned tree under `$DATA`. Single writer for its subtree;
/// the rest of the engine never writes there except through this
/// surface.
#[derive(Debug, Clone)]
pub struct Datastore {
	root: PathBuf,
}

impl Datastore {
	/// Wraps an existing (or not-yet-created) datastore root.
	#[must_use]
	pub fn new(root: PathBuf) -> Self {
		Self { root }
	}

	/// The datastore root.
	#[must_use]
	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Path to the intermediate-symlink tree.
	#[must_use]
	pub fn deployed_symlink_dir(&self) -> PathBuf {
		self.root.join(DEPLOYED_SYMLINK_DIR)
	}

	/// Creates (or replaces) the intermediate symlink pointing at
	/// `source`, named after `target`'s basename, returning its path.
	///
	/// If an intermediate with the same basename already points at
	/// `source`, this is a no-op. Otherwise it is replaced atomically
	/// via a rename from a temp sibling — safe because the intermediate
	/// tree is exclusively ours.
	pub fn link(&self, source: &Path, target: &Path) -> io::Result<PathBuf> {
		let dir = self.deployed_symlink_dir();
		std::fs::create_dir_all(&dir)?;

		let basename = target
			.file_name()
			.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "target has no basename"))?;
		let intermediate = dir.join(basename);

		if let Ok(existing) = std::fs::read_link(&intermediate) {
			if existing == source {
				return Ok(intermediate);
			}
		}

		let tmp = dir.join(format!(".{}.tmp", basename.to_string_lossy()));
		let _ = std::fs::remove_file(&tmp);
		symlink(source, &tmp)?;
		std::fs::rename(&tmp, &intermediate)?;

		Ok(intermediate)
	}

	/// Removes the intermediate symlink for a basename, if present.
	pub fn unlink(&self, basename: &str) -> io::Result<()> {
		let intermediate = self.deployed_symlink_dir().join(basename);

		match std::fs::remove_file(&intermediate) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(e),
		}
	}

	/// Writes (or refreshes) the per-pack PATH marker.
	pub fn add_to_path(&self, pack: &str, dir_path: &Path) -> io::Result<()> {
		let marker_dir = self.root.join(SHELL_PATH_DIR);
		std::fs::create_dir_all(&marker_dir)?;
		std::fs::write(marker_dir.join(pack), dir_path.to_string_lossy().as_bytes())
	}

	/// Reads a single pack's current PATH marker, if any.
	pub fn read_path_marker(&self, pack: &str) -> io::Result<Option<PathBuf>> {
		let marker = self.root.join(SHELL_PATH_DIR).join(pack);

		match std::fs::read_to_string(&marker) {
			Ok(body) => Ok(Some(PathBuf::from(body))),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(e),
		}
	}

	/// Removes a pack's PATH marker.
	pub fn remove_from_path(&self, pack: &str) -> io::Result<()> {
		let marker = self.root.join(SHELL_PATH_DIR).join(pack);

		match std::fs::remove_file(marker) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(e),
		}
	}

	/// Lists the current PATH directories, one per pack, sorted by pack
	/// name for determinism.
	pub fn path_entries(&self) -> io::Result<Vec<(String, PathBuf)>> {
		let marker_dir = self.root.join(SHELL_PATH_DIR);

		if !marker_dir.exists() {
			return Ok(Vec::new());
		}

		let mut entries = Vec::new();

		for entry in std::fs::read_dir(marker_dir)? {
			let entry = entry?;
			let pack = entry.file_name().to_string_lossy().into_owned();
			let dir_path = PathBuf::from(std::fs::read_to_string(entry.path())?);
			entries.push((pack, dir_path));
		}

		entries.sort_by(|a, b| a.0.cmp(&b.0));
		Ok(entries)
	}

	/// Writes (or refreshes) the per-pack shell-source marker.
	pub fn add_shell_source(&self, pack: &str, source_path: &Path) -> io::Result<()> {
		let marker_dir = self.root.join(SHELL_SOURCE_DIR);
		std::fs::create_dir_all(&marker_dir)?;
		std::fs::write(marker_dir.join(pack), source_path.to_string_lossy().as_bytes())
	}

	/// Reads a single pack's current shell-source marker, if any.
	pub fn read_shell_source_marker(&self, pack: &str) -> io::Result<Option<PathBuf>> {
		let marker = self.root.join(SHELL_SOURCE_DIR).join(pack);

		match std::fs::read_to_string(&marker) {
			Ok(body) => Ok(Some(PathBuf::from(body))),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(e),
		}
	}

	/// Removes a pack's shell-source marker.
	pub fn remove_shell_source(&self, pack: &str) -> io::Result<()> {
		let marker = self.root.join(SHELL_SOURCE_DIR).join(pack);

		match std::fs::remove_file(marker) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(e),
		}
	}

	/// Lists the current shell-sourced scripts, one per pack, sorted by
	/// pack name for determinism.
	pub fn shell_sources(&self) -> io::Result<Vec<(String, PathBuf)>> {
		let marker_dir = self.root.join(SHELL_SOURCE_DIR);

		if !marker_dir.exists() {
			return Ok(Vec::new());
		}

		let mut entries = Vec::new();

		for entry in std::fs::read_dir(marker_dir)? {
			let entry = entry?;
			let pack = entry.file_name().to_string_lossy().into_owned();
			let source_path = PathBuf::from(std::fs::read_to_string(entry.path())?);
			entries.push((pack, source_path));
		}

		entries.sort_by(|a, b| a.0.cmp(&b.0));
		Ok(entries)
	}

	/// Rewrites the whole shell-init fragment from the current PATH and
	/// shell-source state, to avoid drift between invocations.
	pub fn rewrite_shell_fragment(&self) -> io::Result<()> {
		let fragment_path = self.root.join(SHELL_INIT_FILE);
		std::fs::create_dir_all(fragment_path.parent().expect("fragment path has a parent"))?;

		let mut out = String::from("# Generated by packline. Do not edit by hand.\n");

		for (_, dir) in self.path_entries()? {
			out.push_str(&format!("export PATH=\"{}:$PATH\"\n", dir.display()));
		}

		for (_, source) in self.shell_sources()? {
			out.push_str(&format!("[ -f \"{}\" ] && . \"{}\"\n", source.display(), source.display()));
		}

		std::fs::write(fragment_path, out)
	}

	/// Reads the sentinel body for `(pack, kind)`, accepting both the
	/// bare-checksum and `checksum:timestamp` forms; returns just the
	/// checksum.
	pub fn read_sentinel(&self, pack: &str, kind: ProvisionKind) -> io::Result<Option<String>> {
		let basename = sentinel_basename(kind);
		let path = sentinel_path(&self.root, pack, kind, basename);

		match std::fs::read_to_string(&path) {
			Ok(body) => Ok(Some(body.split(':').next().unwrap_or(&body).trim().to_owned())),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(e),
		}
	}

	/// Records successful provisioning: writes the timestamped sentinel
	/// form.
	pub fn record_provisioning(&self, pack: &str, kind: ProvisionKind, checksum: &str, timestamp: &str) -> io::Result<()> {
		let basename = sentinel_basename(kind);
		let path = sentinel_path(&self.root, pack, kind, basename);
		std::fs::create_dir_all(path.parent().expect("sentinel path has a parent"))?;
		std::fs::write(path, format!("{checksum}:{timestamp}"))
	}

	/// Removes a pack's provisioning sentinel for `kind`, if present.
	pub fn clear_sentinel(&self, pack: &str, kind: ProvisionKind) -> io::Result<()> {
		let basename = sentinel_basename(kind);
		let path = sentinel_path(&self.root, pack, kind, basename);

		match std::fs::remove_file(path) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(e),
		}
	}

	/// `true` if any state (intermediate symlink, PATH marker, sentinel)
	/// referencing `pack`/`handler_name` exists.
	#[must_use]
	pub fn has_handler_state(&self, pack: &str, handler_name: &str) -> bool {
		match handler_name {
			"path" => self.root.join(SHELL_PATH_DIR).join(pack).exists(),
			"shell" => self.root.join(SHELL_SOURCE_DIR).join(pack).exists(),
			"install" => self.root.join("install").join(pack).exists(),
			"homebrew" => self.root.join("homebrew").join(pack).exists(),
			_ => false,
		}
	}

	/// Removes all datastore state for `(pack, handler_name)`.
	pub fn remove_state(&self, pack: &str, handler_name: &str) -> io::Result<()> {
		match handler_name {
			"path" => self.remove_from_path(pack),
			"shell" => self.remove_shell_source(pack),
			"install" => remove_dir_if_exists(&self.root.join("install").join(pack)),
			"homebrew" => remove_dir_if_exists(&self.root.join("homebrew").join(pack)),
			_ => Ok(()),
		}
	}
}

fn sentinel_basename(kind: ProvisionKind) -> &'static str {
	match kind {
		ProvisionKind::InstallScript => "install",
		ProvisionKind::Homebrew => "Brewfile",
	}
}

fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
	match std::fs::remove_dir_all(path) {
		Ok(()) => Ok(()),
		Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
		Err(e) => Err(e),
	}
}

fn symlink(target: &Path, link: &Path) -> io::Result<()> {
	#[cfg(unix)]
	{
		std::os::unix::fs::symlink(target, link)
	}
	#[cfg(windows)]
	{
		if target.is_dir() {
			std::os::windows::fs::symlink_dir(target, link)
		} else {
			std::os::windows::fs::symlink_file(target, link)
		}
	}
}

/// Advisory, per-invocation lockfile under the datastore root. Released
/// on drop. Not a correctness requirement (§5 Concurrency Model), just a
/// courtesy against accidental concurrent invocations.
#[derive(Debug)]
pub struct Lock {
	path: PathBuf,
}

impl Lock {
	/// Acquires the lock, failing if another invocation already holds
	/// it.
	pub fn acquire(datastore: &Datastore) -> io::Result<Self> {
		std::fs::create_dir_all(&datastore.root)?;
		let path = datastore.root.join(".lock");

		std::fs::OpenOptions::new().create_new(true).write(true).open(&path)?;

		Ok(Self { path })
	}
}

impl Drop for Lock {
	fn drop(&mut self) {
		if let Err(e) = std::fs::remove_file(&self.path) {
			log::warn!("failed to release lock at {}: {e}", self.path.display());
		}
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn link_is_idempotent() {
		let tmp = tempfile::tempdir().unwrap();
		let source = tmp.path().join("vimrc");
		std::fs::write(&source, "\" vim").unwrap();

		let target = tmp.path().join("home/.vimrc");

		let datastore = Datastore::new(tmp.path().join("data"));
		let first = datastore.link(&source, &target).unwrap();
		let second = datastore.link(&source, &target).unwrap();

		assert_eq!(first, second);
		assert_eq!(first.file_name().unwrap(), ".vimrc");
		assert_eq!(std::fs::read_link(&first).unwrap(), source);
	}

	#[test]
	fn sentinel_round_trips_checksum() {
		let tmp = tempfile::tempdir().unwrap();
		let datastore = Datastore::new(tmp.path().join("data"));

		assert!(datastore.read_sentinel("brew-pack", ProvisionKind::Homebrew).unwrap().is_none());

		datastore
			.record_provisioning("brew-pack", ProvisionKind::Homebrew, "abc123", "2026-01-01T00:00:00Z")
			.unwrap();

		assert_eq!(
			datastore.read_sentinel("brew-pack", ProvisionKind::Homebrew).unwrap(),
			Some("abc123".to_owned())
		);
	}

	#[test]
	fn lock_cannot_be_acquired_twice() {
		let tmp = tempfile::tempdir().unwrap();
		let datastore = Datastore::new(tmp.path().join("data"));

		let _first = Lock::acquire(&datastore).unwrap();
		assert!(Lock::acquire(&datastore).is_err());
	}
}
