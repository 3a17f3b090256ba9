//! Confirmation collection (C6).

use std::collections::BTreeMap;

use crate::error::PacklineError;

/// A request for user sign-off before any mutation occurs, returned by a
/// handler alongside its action list.
#[derive(Debug, Clone)]
pub struct ConfirmationRequest {
	/// Unique id; a duplicate add is a programming error.
	pub id: String,
	/// Pack this request belongs to.
	pub pack: String,
	/// Handler that raised it.
	pub handler: String,
	/// Short name of the operation being confirmed.
	pub operation: String,
	/// Short title, shown prominently.
	pub title: String,
	/// Longer description.
	pub description: String,
	/// Affected items, for display.
	pub items: Vec<String>,
	/// Default answer offered to the user.
	pub default_bool: bool,
}

/// A user's answer to a [`ConfirmationRequest`].
#[derive(Debug, Clone, Copy)]
pub struct ConfirmationResponse {
	/// Echoes the request id.
	pub id_index: usize,
	/// Whether the user approved.
	pub approved: bool,
}

/// UI capability: present a batch of requests, return the answers.
pub trait ConfirmationDialog {
	/// Presents `requests` and returns one response per request, in the
	/// same order.
	fn present(&self, requests: &[ConfirmationRequest]) -> color_eyre::Result<Vec<ConfirmationResponse>>;
}

/// Gathers and de-duplicates [`ConfirmationRequest`]s from handlers.
#[derive(Debug, Default)]
pub struct Collector {
	requests: Vec<ConfirmationRequest>,
	seen_ids: BTreeMap<String, ()>,
}

impl Collector {
	/// Creates an empty collector.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a request. Fails if its id was already added.
	pub fn add(&mut self, request: ConfirmationRequest) -> Result<(), PacklineError> {
		if self.seen_ids.insert(request.id.clone(), ()).is_some() {
			return Err(PacklineError::DuplicateConfirmationId(request.id));
		}

		self.requests.push(request);
		Ok(())
	}

	/// Returns the collected requests, stably sorted by
	/// `(pack, handler, operation)`.
	#[must_use]
	pub fn into_sorted(mut self) -> Vec<ConfirmationRequest> {
		self.requests
			.sort_by(|a, b| (&a.pack, &a.handler, &a.operation).cmp(&(&b.pack, &b.handler, &b.operation)));
		self.requests
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn request(id: &str) -> ConfirmationRequest {
		ConfirmationRequest {
			id: id.to_owned(),
			pack: "vim".to_owned(),
			handler: "install".to_owned(),
			operation: "run".to_owned(),
			title: "Run install.sh?".to_owned(),
			description: String::new(),
			items: Vec::new(),
			default_bool: false,
		}
	}

	#[test]
	fn duplicate_id_fails() {
		let mut collector = Collector::new();
		collector.add(request("a")).unwrap();

		let err = collector.add(request("a")).unwrap_err();
		assert!(matches!(err, PacklineError::DuplicateConfirmationId(_)));
	}

	#[test]
	fn sorted_by_pack_handler_operation() {
		let mut collector = Collector::new();
		collector
			.add(ConfirmationRequest {
				pack: "zsh".to_owned(),
				..request("z")
			})
			.unwrap();
		collector
			.add(ConfirmationRequest {
				pack: "bash".to_owned(),
				..request("b")
			})
			.unwrap();

		let sorted = collector.into_sorted();
		assert_eq!(sorted[0].pack, "bash");
		assert_eq!(sorted[1].pack, "zsh");
	}
}
