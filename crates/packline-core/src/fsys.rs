//! The `FS` capability: every filesystem primitive the engine touches,
//! behind a trait seam so [`crate::exec`]/[`crate::status`] can be driven
//! against a fixture tree in tests without hitting a real home directory.

use std::io;
use std::path::{Path, PathBuf};

/// Kind of filesystem entry, as reported by [`FS::lstat`]/[`FS::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
	/// Regular file.
	File,
	/// Directory.
	Dir,
	/// Symlink (not followed).
	Symlink,
	/// Something else (device, socket, ...).
	Other,
}

/// Filesystem primitives used by the engine.
///
/// All operations report structured errors; callers distinguish
/// "not found" via [`is_not_found`].
pub trait FS {
	/// `stat`, following symlinks.
	fn stat(&self, path: &Path) -> io::Result<EntryKind>;

	/// `lstat`, not following the final symlink component.
	fn lstat(&self, path: &Path) -> io::Result<EntryKind>;

	/// Reads the target of a symlink.
	fn readlink(&self, path: &Path) -> io::Result<PathBuf>;

	/// Creates a symlink at `link` pointing at `target`.
	fn symlink(&self, target: &Path, link: &Path) -> io::Result<()>;

	/// Creates `path` and all missing parent directories.
	fn mkdir_all(&self, path: &Path) -> io::Result<()>;

	/// Removes a file or symlink (not a directory).
	fn remove_file(&self, path: &Path) -> io::Result<()>;

	/// Atomically replaces `to` with `from`.
	fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

	/// Reads a file's entire content as a string.
	fn read_to_string(&self, path: &Path) -> io::Result<String>;

	/// Writes `content`, creating or truncating `path`.
	fn write(&self, path: &Path, content: &str) -> io::Result<()>;

	/// Appends `content` to `path`, creating it if absent.
	fn append(&self, path: &Path, content: &str) -> io::Result<()>;

	/// Recursively lists all files under `root`, depth-first, in a
	/// stable order.
	fn walk(&self, root: &Path) -> io::Result<Vec<PathBuf>>;

	/// Returns `true` if `path` exists (following symlinks); does not
	/// error on a dangling symlink, only on genuine I/O failure.
	fn exists(&self, path: &Path) -> bool {
		match self.stat(path) {
			Ok(_) => true,
			Err(e) if is_not_found(&e) => false,
			Err(_) => false,
		}
	}
}

/// Returns `true` if `err` represents a missing path.
#[must_use]
pub fn is_not_found(err: &io::Error) -> bool {
	err.kind() == io::ErrorKind::NotFound
}

/// The real, blocking, `std::fs`-backed implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFs;

impl FS for StdFs {
	fn stat(&self, path: &Path) -> io::Result<EntryKind> {
		let meta = std::fs::metadata(path)?;
		Ok(kind_of(&meta))
	}

	fn lstat(&self, path: &Path) -> io::Result<EntryKind> {
		let meta = std::fs::symlink_metadata(path)?;
		Ok(kind_of(&meta))
	}

	fn readlink(&self, path: &Path) -> io::Result<PathBuf> {
		std::fs::read_link(path)
	}

	fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
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

	fn mkdir_all(&self, path: &Path) -> io::Result<()> {
		std::fs::create_dir_all(path)
	}

	fn remove_file(&self, path: &Path) -> io::Result<()> {
		std::fs::remove_file(path)
	}

	fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
		std::fs::rename(from, to)
	}

	fn read_to_string(&self, path: &Path) -> io::Result<String> {
		std::fs::read_to_string(path)
	}

	fn write(&self, path: &Path, content: &str) -> io::Result<()> {
		std::fs::write(path, content)
	}

	fn append(&self, path: &Path, content: &str) -> io::Result<()> {
		use std::io::Write as _;

		let mut file = std::fs::OpenOptions::new()
			.create(true)
			.append(true)
			.open(path)?;

		file.write_all(content.as_bytes())
	}

	fn walk(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
		let mut out = Vec::new();

		for entry in walkdir::WalkDir::new(root).sort_by_file_name() {
			let entry = entry.map_err(|e| {
				io::Error::new(io::ErrorKind::Other, e.to_string())
			})?;

			if entry.file_type().is_file() {
				out.push(entry.into_path());
			}
		}

		Ok(out)
	}
}

fn kind_of(meta: &std::fs::Metadata) -> EntryKind {
	if meta.is_symlink() {
		EntryKind::Symlink
	} else if meta.is_dir() {
		EntryKind::Dir
	} else if meta.is_file() {
		EntryKind::File
	} else {
		EntryKind::Other
	}
}
