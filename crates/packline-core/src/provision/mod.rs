//! The provisioning gate (C5): skip `Provision` actions whose source
//! checksum already matches a stored sentinel.

use std::io::Read as _;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::action::{Action, ActionKind};
use crate::datastore::Datastore;

/// Streaming SHA-256 of a file's content, as lowercase hex.
pub fn checksum_file(path: &Path) -> std::io::Result<String> {
	let mut file = std::fs::File::open(path)?;
	let mut hasher = Sha256::new();
	let mut buf = [0_u8; 8192];

	loop {
		let n = file.read(&mut buf)?;

		if n == 0 {
			break;
		}

		hasher.update(&buf[..n]);
	}

	Ok(to_hex(&hasher.finalize()))
}

/// Lowercase hex encoding, without pulling in a dedicated `hex` crate
/// for one call site.
fn to_hex(bytes: &[u8]) -> String {
	use std::fmt::Write as _;

	let mut out = String::with_capacity(bytes.len() * 2);

	for byte in bytes {
		write!(out, "{byte:02x}").expect("writing to a String never fails");
	}

	out
}

/// Result of gating one `Provision` action.
#[derive(Debug, Clone)]
pub enum GateDecision {
	/// Eligible to run; carries the freshly computed checksum.
	Eligible {
		/// Computed checksum, to be written to the sentinel on success.
		checksum: String,
	},
	/// Already provisioned with this exact source; drop the action.
	AlreadyProvisioned,
}

/// Applies the provisioning gate to a list of planned actions, mutating
/// their `metadata["checksum"]` and filtering out already-provisioned
/// ones.
#[derive(Debug, Clone, Copy)]
pub struct Gate<'a> {
	/// Skip the sentinel check and clear sentinels for selected packs
	/// first (models a clean re-run).
	pub force_reprovision: bool,
	/// Drop all `Provision` actions regardless of sentinel state.
	pub skip_provisioning: bool,
	/// Backing datastore, for sentinel reads/clears.
	pub datastore: &'a Datastore,
}

impl Gate<'_> {
	/// Filters and annotates `actions` in place, returning the names of
	/// packs skipped because they were already provisioned (for user
	/// messaging).
	pub fn apply(&self, actions: Vec<Action>) -> std::io::Result<(Vec<Action>, Vec<String>)> {
		if self.skip_provisioning {
			return Ok((
				actions
					.into_iter()
					.filter(|a| !matches!(a.kind, ActionKind::Provision { .. }))
					.collect(),
				Vec::new(),
			));
		}

		if self.force_reprovision {
			for action in &actions {
				if let ActionKind::Provision { kind, .. } = &action.kind {
					self.datastore.clear_sentinel(&action.pack, *kind)?;
				}
			}
		}

		let mut kept = Vec::with_capacity(actions.len());
		let mut skipped_packs = Vec::new();

		for mut action in actions {
			let ActionKind::Provision { kind, source } = &action.kind else {
				kept.push(action);
				continue;
			};

			let checksum = checksum_file(source)?;

			match self.decide(&action.pack, *kind, &checksum)? {
				GateDecision::AlreadyProvisioned => {
					skipped_packs.push(action.pack.clone());
				}
				GateDecision::Eligible { checksum } => {
					action.metadata.insert("checksum".to_owned(), checksum);
					kept.push(action);
				}
			}
		}

		Ok((kept, skipped_packs))
	}

	fn decide(
		&self,
		pack: &str,
		kind: crate::action::ProvisionKind,
		checksum: &str,
	) -> std::io::Result<GateDecision> {
		if self.force_reprovision {
			return Ok(GateDecision::Eligible {
				checksum: checksum.to_owned(),
			});
		}

		match self.datastore.read_sentinel(pack, kind)? {
			Some(existing) if existing == checksum => Ok(GateDecision::AlreadyProvisioned),
			_ => Ok(GateDecision::Eligible {
				checksum: checksum.to_owned(),
			}),
		}
	}
}

/// Path a sentinel for `(pack, kind, source_basename)` would live at,
/// under a given `$DATA` root. See DESIGN.md for the open-question
/// decision on this encoding.
#[must_use]
pub fn sentinel_path(data_root: &Path, pack: &str, kind: crate::action::ProvisionKind, source_basename: &str) -> PathBuf {
	let category = match kind {
		crate::action::ProvisionKind::InstallScript => "install",
		crate::action::ProvisionKind::Homebrew => "homebrew",
	};

	data_root
		.join(category)
		.join(pack)
		.join(format!("{source_basename}.sentinel"))
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn checksum_is_stable_hex_sha256() {
		let tmp = tempfile::tempdir().unwrap();
		let file = tmp.path().join("Brewfile");
		std::fs::write(&file, b"brew \"fish\"\n").unwrap();

		let digest = checksum_file(&file).unwrap();
		assert_eq!(digest.len(), 64);
		assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
	}
}
