use std::cell::RefCell;
use std::rc::Rc;

use crate::dependencies::Dependencies;
use crate::{Source, Version};

/// Dependency-recording frame lent to a formula closure for the
/// duration of one evaluation. Every tracked read deposits the node
/// and the version observed at that moment; the formula collects the
/// map afterwards and diffs it against the previous evaluation.
pub struct Evaluation {
	inner: RefCell<Dependencies>,
}

impl AsRef<Evaluation> for Evaluation {
	fn as_ref(&self) -> &Evaluation {
		self
	}
}

impl Evaluation {
	pub(crate) fn new() -> Self {
		Evaluation {
			inner: RefCell::new(Dependencies::new()),
		}
	}

	pub(crate) fn record(&self, source: Rc<dyn Source>, version: Version) {
		self.inner.borrow_mut().record(source, version);
	}

	pub(crate) fn take(self) -> Dependencies {
		self.inner.into_inner()
	}
}
