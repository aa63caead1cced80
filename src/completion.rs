use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;

use thiserror::Error;

use crate::hashed;

/// Failure payload of a formula or subscription closure. Faults are
/// cheap to clone and participate in change detection exactly like
/// values: recomputing to an equal fault is not a change.
#[derive(Clone, PartialEq, Eq, Hash, Error)]
#[error("{message}")]
pub struct Fault {
	message: Rc<str>,
}

impl Fault {
	pub fn new(message: impl Into<Rc<str>>) -> Self {
		Fault {
			message: message.into(),
		}
	}

	pub fn message(&self) -> &str {
		&self.message
	}
}

impl Debug for Fault {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_tuple("Fault").field(&self.message).finish()
	}
}

/// Outcome of running a node closure. Both variants are cached and
/// versioned; `Abrupt` turns back into `Err` at the read surface
/// without re-running the closure.
#[derive(Hash, Debug)]
pub enum Completion<T> {
	Normal(T),
	Abrupt(Fault),
}

impl<T> Completion<T> {
	/// Fingerprint covering both the variant and its payload, so a
	/// `Normal`/`Abrupt` flip always registers as a change.
	pub fn fingerprint(&self) -> u64
	where
		T: Hash,
	{
		hashed::fingerprint(self)
	}
}

impl<T> From<Result<T, Fault>> for Completion<T> {
	fn from(result: Result<T, Fault>) -> Self {
		match result {
			Ok(value) => Completion::Normal(value),
			Err(fault) => Completion::Abrupt(fault),
		}
	}
}
