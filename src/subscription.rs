use std::cell::{Ref, RefCell};
use std::hash::Hash;
use std::rc::{Rc, Weak};

use crate::completion::{Completion, Fault};
use crate::evaluation::Evaluation;
use crate::node::{Listener, NodeState};
use crate::value::{Access, Value};
use crate::{txn, Dependent, Source, Validity, Version};

/// Adapter over an external change source, exposed with the same
/// reactive surface as a cell. The defining behavior is lazy upstream
/// attachment: an unobserved subscription never registers with the
/// external source and pulls a fresh value on every read; once
/// observed it installs one upstream callback and trusts its cache
/// until that callback fires.
pub struct Subscription<T>
where
	T: Hash + 'static,
{
	body: Rc<SubscriptionBody<T>>,
}

impl<T> Clone for Subscription<T>
where
	T: Hash,
{
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

/// The external surface the subscription adapts. None of the handlers
/// are invoked at construction.
pub struct Handlers<T> {
	pub get: Box<dyn Fn() -> Result<T, Fault>>,
	pub attach: Box<dyn Fn(Listener)>,
	pub detach: Box<dyn Fn(&Listener)>,
}

pub struct SubscriptionBody<T>
where
	T: Hash + 'static,
{
	cache: RefCell<Option<Completion<T>>>,
	/// Immutable after construction, held outside the `RefCell` so
	/// handler calls run with no engine borrows outstanding.
	handlers: Handlers<T>,
	inner: RefCell<SubscriptionInner<T>>,
}

struct SubscriptionInner<T>
where
	T: Hash + 'static,
{
	callback: Option<Listener>,
	validity: Validity,
	version: Version,
	fingerprint: Option<u64>,
	node: NodeState,
	this: Weak<SubscriptionBody<T>>,
}

impl<T> Subscription<T>
where
	T: Hash + 'static,
{
	pub fn new(
		get: Box<dyn Fn() -> Result<T, Fault>>,
		attach: Box<dyn Fn(Listener)>,
		detach: Box<dyn Fn(&Listener)>,
	) -> Self {
		Subscription {
			body: Rc::new_cyclic(|this| SubscriptionBody {
				cache: RefCell::new(None),
				handlers: Handlers { get, attach, detach },
				inner: RefCell::new(SubscriptionInner {
					callback: None,
					validity: Validity::Fresh,
					version: Version::default(),
					fingerprint: None,
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
		self.body.refresh()
	}
}

impl<T> SubscriptionBody<T>
where
	T: Hash + 'static,
{
	pub fn get_once(&self) -> Result<Ref<'_, T>, Fault> {
		self.refresh();
		self.current()
	}

	pub fn get<'a>(&'a self, cx: &'_ Evaluation) -> Result<Ref<'a, T>, Fault> {
		let version = self.refresh();

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
			_ => unreachable!("refreshed subscription holds a completion"),
		}))
	}

	/// While unobserved there is no upstream callback keeping the
	/// cache honest, so every read outside the current transaction
	/// pulls through the external `get`. While observed the cache
	/// stands until the callback invalidates it. The external `get`
	/// takes no evaluation frame, so it cannot record spurious
	/// dependencies.
	fn refresh(&self) -> Version {
		let tx = txn::current();

		{
			let inner = self.inner.borrow();
			if let (Validity::Checked(seen), Some(tx)) = (inner.validity, tx) {
				if seen == tx {
					return inner.version;
				}
			}

			let stale = matches!(inner.validity, Validity::Fresh | Validity::Invalid);
			if inner.node.is_observed() && !stale {
				return inner.version;
			}
		}

		let completion = Completion::from((self.handlers.get)());
		let fingerprint = completion.fingerprint();
		self.cache.borrow_mut().replace(completion);

		let mut inner = self.inner.borrow_mut();
		if inner.fingerprint != Some(fingerprint) {
			inner.fingerprint = Some(fingerprint);
			inner.version.bump();
		}
		inner.validity = match tx {
			Some(tx) => Validity::Checked(tx),
			None => Validity::Standing,
		};
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

	/// First observer arrived. Unless the cache was refreshed within
	/// the current transaction it is discarded — a silent upstream
	/// change may have happened since the last read — and the
	/// upstream callback is installed.
	fn start_listening(&self) {
		let (invalidated, callback) = {
			let mut inner = self.inner.borrow_mut();

			let current = matches!(
				(inner.validity, txn::current()),
				(Validity::Checked(seen), Some(tx)) if seen == tx
			);
			let invalidated = !current && !matches!(inner.validity, Validity::Fresh);
			if !current {
				inner.validity = Validity::Invalid;
			}

			let weak = inner.this.clone();
			let callback: Listener = Rc::new(move || {
				if let Some(body) = weak.upgrade() {
					body.invalidated();
				}
			});
			inner.callback = Some(callback.clone());

			(invalidated, callback)
		};

		if invalidated {
			self.cache.borrow_mut().take();
		}

		tracing::debug!("subscription attached upstream");
		(self.handlers.attach)(callback);
	}

	fn stop_listening(&self) {
		let callback = self.inner.borrow_mut().callback.take();

		if let Some(callback) = callback {
			tracing::debug!("subscription detached upstream");
			(self.handlers.detach)(&callback);
		}
	}

	/// Upstream change callback; behaves exactly like a formula's
	/// notify. First delivery invalidates and fans out, repeats
	/// no-op.
	fn invalidated(&self) {
		{
			let mut inner = self.inner.borrow_mut();
			match inner.validity {
				Validity::Fresh | Validity::Invalid => return,
				Validity::Checked(_) | Validity::Standing => {
					inner.validity = Validity::Invalid;
				}
			}
		}

		self.cache.borrow_mut().take();

		let fanout = self.inner.borrow().node.snapshot();
		fanout.run();
	}
}

impl<T> Drop for SubscriptionBody<T>
where
	T: Hash + 'static,
{
	fn drop(&mut self) {
		if let Some(callback) = self.inner.borrow_mut().callback.take() {
			(self.handlers.detach)(&callback);
		}
	}
}

impl<T> Source for SubscriptionBody<T>
where
	T: Hash + 'static,
{
	fn latest_version(&self) -> Version {
		self.refresh()
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

impl<T> Access<T> for SubscriptionBody<T>
where
	T: Hash + 'static,
{
	fn get(&self, cx: &Evaluation) -> Result<crate::value::Ref<'_, T>, Fault> {
		SubscriptionBody::get(self, cx).map(crate::value::Ref::Cell)
	}

	fn get_once(&self) -> Result<crate::value::Ref<'_, T>, Fault> {
		SubscriptionBody::get_once(self).map(crate::value::Ref::Cell)
	}
}

impl<T> From<Subscription<T>> for Value<T>
where
	T: Hash + 'static,
{
	fn from(subscription: Subscription<T>) -> Self {
		Value::new(subscription.body)
	}
}
