use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use crate::ident::RcIdent;
use crate::{Dependent, Source, Version};

/// Ordered map from dependency to the version observed when the
/// owning node last evaluated. Iteration order is pointer-stable, so
/// the first-stale-wins walk in `still_current` is deterministic for
/// a given set.
#[derive(Default, Clone)]
pub struct Dependencies {
	based_on: BTreeMap<RcIdent<dyn Source>, Version>,
}

impl Dependencies {
	pub fn new() -> Self {
		Self {
			based_on: BTreeMap::new(),
		}
	}

	pub fn len(&self) -> usize {
		self.based_on.len()
	}

	pub fn is_empty(&self) -> bool {
		self.based_on.is_empty()
	}

	/// Repeat reads of the same node collapse to one entry holding
	/// the version seen last.
	pub(crate) fn record(&mut self, source: Rc<dyn Source>, version: Version) {
		self.based_on.insert(RcIdent::new(source), version);
	}

	/// True when every dependency still reports the version observed
	/// at the last evaluation. Stops at the first stale entry.
	pub(crate) fn still_current(&self) -> bool {
		for (source, observed) in self.based_on.iter() {
			if source.latest_version() > *observed {
				return false;
			}
		}

		true
	}

	pub(crate) fn attach_all(&self, dependent: &Weak<dyn Dependent>) {
		for source in self.based_on.keys() {
			source.add_dependent(dependent.clone());
		}
	}

	pub(crate) fn detach_all(&self, dependent: &Weak<dyn Dependent>) {
		for source in self.based_on.keys() {
			source.remove_dependent(dependent);
		}
	}

	/// Register the owner with dependencies gained since `prev` and
	/// unregister it from dependencies `prev` no longer contains.
	/// Dependencies present in both sets are left untouched.
	pub(crate) fn diff(&self, prev: &Dependencies, dependent: &Weak<dyn Dependent>) {
		for source in self.based_on.keys() {
			if !prev.based_on.contains_key(source) {
				source.add_dependent(dependent.clone());
			}
		}

		for source in prev.based_on.keys() {
			if !self.based_on.contains_key(source) {
				source.remove_dependent(dependent);
			}
		}
	}
}
