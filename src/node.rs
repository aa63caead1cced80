use std::collections::BTreeSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::ident::{RcIdent, WeakIdent};
use crate::scheduler;
use crate::Dependent;

/// External callback attached directly to a node. Identity is the
/// `Rc` pointer; the same closure can be attached more than once and
/// is then invoked once per attachment.
pub type Listener = Rc<dyn Fn()>;

/// Listener and dependent bookkeeping shared by every node kind. The
/// owner embeds this in its inner state and feeds `snapshot` into
/// [`Fanout::run`] when it invalidates.
#[derive(Default)]
pub(crate) struct NodeState {
	listeners: Vec<RcIdent<dyn Fn()>>,
	dependents: BTreeSet<WeakIdent<dyn Dependent>>,
}

impl NodeState {
	pub fn add_listener(&mut self, listener: Listener) {
		self.listeners.push(RcIdent::new(listener));
	}

	/// Removes one occurrence; listeners form a multiset of
	/// identities.
	pub fn remove_listener(&mut self, listener: &Listener) {
		let ident = RcIdent::new(listener.clone());
		if let Some(at) = self.listeners.iter().position(|l| *l == ident) {
			self.listeners.remove(at);
		}
	}

	pub fn add_dependent(&mut self, dependent: Weak<dyn Dependent>) {
		self.dependents.insert(WeakIdent::new(dependent));
	}

	pub fn remove_dependent(&mut self, dependent: &Weak<dyn Dependent>) {
		self.dependents.remove(&WeakIdent::new(dependent.clone()));
	}

	pub fn is_observed(&self) -> bool {
		!self.listeners.is_empty() || !self.dependents.is_empty()
	}

	/// Copy out both lists so fanout can run with no borrows held.
	/// Listeners added after the snapshot do not fire in this pass;
	/// removal mid-pass is tolerated.
	pub fn snapshot(&self) -> Fanout {
		Fanout {
			listeners: self.listeners.iter().map(|l| (**l).clone()).collect(),
			dependents: self.dependents.iter().map(|d| (**d).clone()).collect(),
		}
	}
}

pub(crate) struct Fanout {
	listeners: SmallVec<[Listener; 4]>,
	dependents: SmallVec<[Weak<dyn Dependent>; 4]>,
}

impl Fanout {
	/// Walk listeners first, then push `notify` down to dependents.
	/// A panicking listener does not stop delivery; its payload is
	/// re-raised through the scheduler once the root fanout returns.
	pub fn run(self) {
		let _root = scheduler::fanout_scope();

		for listener in self.listeners {
			if let Err(payload) = catch_unwind(AssertUnwindSafe(|| (*listener)())) {
				tracing::error!("listener panicked during fanout");
				scheduler::defer_panic(payload);
			}
		}

		for dependent in self.dependents {
			if let Some(dependent) = dependent.upgrade() {
				dependent.notify();
			}
		}
	}
}
