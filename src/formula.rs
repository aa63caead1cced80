use std::any::Any;
use std::cell::{Ref, RefCell};
use std::hash::Hash;
use std::rc::{Rc, Weak};

use crate::completion::{Completion, Fault};
use crate::dependencies::Dependencies;
use crate::evaluation::Evaluation;
use crate::node::{Listener, NodeState};
use crate::txn::{self, TxId};
use crate::value::{Access, Value};
use crate::{Dependent, Source, Validity, Version};

/// Memoized derived node. The closure is never run at construction;
/// the first read evaluates it, recording every tracked read into the
/// dependency set. Later reads revalidate: short-circuit within the
/// current transaction, otherwise walk the observed versions and
/// recompute only when one moved.
pub struct Formula<T>
where
	T: Hash + 'static,
{
	body: Rc<FormulaBody<T>>,
}

impl<T> Clone for Formula<T>
where
	T: Hash,
{
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

impl<T: Hash + 'static> From<Formula<T>> for Rc<dyn Any> {
	fn from(formula: Formula<T>) -> Self {
		formula.body
	}
}

impl<T: Hash + 'static> TryFrom<Rc<dyn Any>> for Formula<T> {
	type Error = Rc<dyn Any>;
	fn try_from(value: Rc<dyn Any>) -> Result<Self, Self::Error> {
		Rc::downcast::<FormulaBody<T>>(value).map(|body| Formula { body })
	}
}

pub struct FormulaBody<T>
where
	T: Hash + 'static,
{
	/// Completion payload lives beside `inner` so reads can hand out
	/// `Ref`s while the bookkeeping stays borrowable. Cleared on
	/// invalidation; the fingerprint in `inner` survives.
	cache: RefCell<Option<Completion<T>>>,
	inner: RefCell<FormulaInner<T>>,
}

struct FormulaInner<T>
where
	T: Hash + 'static,
{
	func: Box<dyn Fn(&Evaluation) -> Result<T, Fault>>,
	validity: Validity,
	version: Version,
	fingerprint: Option<u64>,
	dependencies: Dependencies,
	node: NodeState,
	this: Weak<FormulaBody<T>>,
}

impl<T> Drop for FormulaInner<T>
where
	T: Hash + 'static,
{
	fn drop(&mut self) {
		if self.node.is_observed() {
			let this = self.this.clone() as Weak<dyn Dependent>;
			self.dependencies.detach_all(&this);
		}
	}
}

impl<T> Formula<T>
where
	T: Hash + 'static,
{
	pub fn new(func: Box<dyn Fn(&Evaluation) -> T>) -> Self {
		Self::fallible(Box::new(move |cx| Ok(func(cx))))
	}

	/// A formula whose closure may fail. The failure is cached as the
	/// formula's completion and returned from every read until a
	/// recomputation produces a different completion.
	pub fn fallible(func: Box<dyn Fn(&Evaluation) -> Result<T, Fault>>) -> Self {
		Formula {
			body: Rc::new_cyclic(|this| FormulaBody {
				cache: RefCell::new(None),
				inner: RefCell::new(FormulaInner {
					func,
					validity: Validity::Fresh,
					version: Version::default(),
					fingerprint: None,
					dependencies: Dependencies::new(),
					node: NodeState::default(),
					this: this.clone(),
				}),
			}),
		}
	}

	#[inline]
	pub fn get<'a>(&'a self, cx: &'a impl AsRef<Evaluation>) -> Result<Ref<'a, T>, Fault> {
		self.body.get(cx.as_ref())
	}

	#[inline]
	pub fn get_once(&self) -> Result<Ref<'_, T>, Fault> {
		self.body.get_once()
	}

	pub fn add_listener(&self, listener: Listener) {
		self.body.add_listener(listener)
	}

	pub fn remove_listener(&self, listener: &Listener) {
		self.body.remove_listener(listener)
	}

	pub fn latest_version(&self) -> Version {
		self.body.validate()
	}
}

impl<T> FormulaBody<T>
where
	T: Hash + 'static,
{
	pub fn get_once(&self) -> Result<Ref<'_, T>, Fault> {
		self.validate();
		self.current()
	}

	pub fn get<'a>(&'a self, cx: &'_ Evaluation) -> Result<Ref<'a, T>, Fault> {
		let version = self.validate();

		{
			let inner = self.inner.borrow();
			cx.record(inner.this.upgrade().unwrap(), version);
		}

		self.current()
	}

	fn current(&self) -> Result<Ref<'_, T>, Fault> {
		let cache = self.cache.borrow();

		if let Some(Completion::Abrupt(fault)) = &*cache {
			return Err(fault.clone());
		}

		Ok(Ref::map(cache, |cached| match cached {
			Some(Completion::Normal(value)) => value,
			_ => unreachable!("validated formula holds a completion"),
		}))
	}

	/// The validation protocol. Returns the version of the value the
	/// cache holds on exit.
	pub(crate) fn validate(&self) -> Version {
		let tx = txn::enter();

		{
			let inner = self.inner.borrow();
			if inner.validity == Validity::Checked(tx.id()) {
				return inner.version;
			}
		}

		let recompute = {
			let inner = self.inner.borrow();
			let retained = match inner.validity {
				Validity::Fresh | Validity::Invalid => None,
				Validity::Checked(_) | Validity::Standing => Some(inner.dependencies.clone()),
			};
			std::mem::drop(inner);

			match retained {
				None => true,
				Some(dependencies) => !dependencies.still_current(),
			}
		};

		if recompute {
			self.recompute(tx.id())
		} else {
			let mut inner = self.inner.borrow_mut();
			inner.validity = Validity::Checked(tx.id());
			inner.version
		}
	}

	fn recompute(&self, tx: TxId) -> Version {
		let (completion, fresh) = {
			let inner = self.inner.borrow();
			let cx = Evaluation::new();
			let result = {
				let _scope = txn::eval_scope();
				(inner.func)(&cx)
			};
			(Completion::from(result), cx.take())
		};

		let fingerprint = completion.fingerprint();
		self.cache.borrow_mut().replace(completion);

		let mut inner = self.inner.borrow_mut();
		if inner.fingerprint != Some(fingerprint) {
			inner.fingerprint = Some(fingerprint);
			inner.version.bump();
		}

		let prev = std::mem::replace(&mut inner.dependencies, fresh);
		if inner.node.is_observed() {
			let this = inner.this.clone() as Weak<dyn Dependent>;
			inner.dependencies.diff(&prev, &this);
		}

		inner.validity = Validity::Checked(tx);
		tracing::trace!(version = ?inner.version, dependencies = inner.dependencies.len(), "formula recomputed");
		inner.version
	}

	fn add_listener(&self, listener: Listener) {
		let became_observed = {
			let mut inner = self.inner.borrow_mut();
			let was = inner.node.is_observed();
			inner.node.add_listener(listener);
			!was
		};

		if became_observed {
			self.start_listening();
		}
	}

	fn remove_listener(&self, listener: &Listener) {
		let ceased = {
			let mut inner = self.inner.borrow_mut();
			let was = inner.node.is_observed();
			inner.node.remove_listener(listener);
			was && !inner.node.is_observed()
		};

		if ceased {
			self.stop_listening();
		}
	}

	/// First observer arrived: register with every dependency so push
	/// invalidation reaches us. A never-evaluated formula has no
	/// dependency set yet, so it is evaluated first and the
	/// post-recompute diff performs the registrations.
	fn start_listening(&self) {
		if matches!(self.inner.borrow().validity, Validity::Fresh) {
			self.validate();
			return;
		}

		let inner = self.inner.borrow();
		let this = inner.this.clone() as Weak<dyn Dependent>;
		inner.dependencies.attach_all(&this);
	}

	fn stop_listening(&self) {
		let inner = self.inner.borrow();
		if matches!(inner.validity, Validity::Fresh) {
			return;
		}

		let this = inner.this.clone() as Weak<dyn Dependent>;
		inner.dependencies.detach_all(&this);
	}
}

impl<T> Source for FormulaBody<T>
where
	T: Hash + 'static,
{
	fn latest_version(&self) -> Version {
		self.validate()
	}

	fn add_dependent(&self, dependent: Weak<dyn Dependent>) {
		let became_observed = {
			let mut inner = self.inner.borrow_mut();
			let was = inner.node.is_observed();
			inner.node.add_dependent(dependent);
			!was
		};

		if became_observed {
			self.start_listening();
		}
	}

	fn remove_dependent(&self, dependent: &Weak<dyn Dependent>) {
		let ceased = {
			let mut inner = self.inner.borrow_mut();
			let was = inner.node.is_observed();
			inner.node.remove_dependent(dependent);
			was && !inner.node.is_observed()
		};

		if ceased {
			self.stop_listening();
		}
	}
}

impl<T> Dependent for FormulaBody<T>
where
	T: Hash + 'static,
{
	/// Invalidation keeps the dependency set and the dependent
	/// registrations; only the payload is dropped. Teardown of stale
	/// registrations happens in the diff after the next
	/// recomputation.
	fn notify(self: Rc<Self>) {
		{
			let mut inner = self.inner.borrow_mut();
			match inner.validity {
				Validity::Fresh | Validity::Invalid => return,
				Validity::Checked(_) | Validity::Standing => {
					inner.validity = Validity::Invalid;
				}
			}
		}

		tracing::trace!("formula invalidated");
		self.cache.borrow_mut().take();

		let fanout = self.inner.borrow().node.snapshot();
		fanout.run();
	}
}

impl<T> Access<T> for FormulaBody<T>
where
	T: Hash + 'static,
{
	fn get(&self, cx: &Evaluation) -> Result<crate::value::Ref<'_, T>, Fault> {
		FormulaBody::get(self, cx).map(crate::value::Ref::Cell)
	}

	fn get_once(&self) -> Result<crate::value::Ref<'_, T>, Fault> {
		FormulaBody::get_once(self).map(crate::value::Ref::Cell)
	}
}

impl<T> From<Formula<T>> for Value<T>
where
	T: Hash + 'static,
{
	fn from(formula: Formula<T>) -> Self {
		Value::new(formula.body)
	}
}
