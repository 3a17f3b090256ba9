#![allow(
	dead_code,
	rustdoc::private_intra_doc_links,
	clippy::needless_lifetimes
)]
#![deny(
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
)]
#![cfg_attr(docsrs, feature(doc_cfg), feature(doc_alias))]

//! This is the library powering `packline`, a cross-platform dotfiles
//! deployment engine: discovery, rule matching, handler action planning,
//! the two-link deployment strategy, sentinel-gated provisioning, and
//! the dangling-link/status detector.

pub mod action;
pub mod confirm;
pub mod datastore;
pub mod error;
pub mod exec;
pub mod fsys;
pub mod handler;
pub mod pack;
pub mod provision;
pub mod rule;
pub mod safety;
pub mod seed;
pub mod status;

#[cfg(test)]
mod tests {
	use std::sync::Once;

	static SETUP_GATE: Once = Once::new();

	pub fn setup_test_env() {
		SETUP_GATE.call_once(|| {
			env_logger::Builder::from_env(
				env_logger::Env::default().default_filter_or(log::Level::Debug.as_str()),
			)
			.is_test(true)
			.try_init()
			.unwrap();

			color_eyre::install().unwrap();
		})
	}
}
