use std::any::Any;
use std::cell::{Ref, RefCell};
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::{Rc, Weak};

use crate::error::WriteError;
use crate::evaluation::Evaluation;
use crate::hashed::Hashed;
use crate::node::{Listener, NodeState};
use crate::scheduler::{self, ScheduleFn};
use crate::value::{Access, Value};
use crate::{txn, Dependent, Formula, Source, Version};

/// Mutable source node. Writes are equality-filtered, bump the
/// version synchronously and deliver notification fanout through the
/// scheduler hook.
pub struct Cell<T> {
	body: Rc<CellBody<T>>,
}

impl<T: 'static> From<Cell<T>> for Rc<dyn Any> {
	fn from(cell: Cell<T>) -> Self {
		cell.body
	}
}

impl<T: 'static> TryFrom<Rc<dyn Any>> for Cell<T> {
	type Error = Rc<dyn Any>;
	fn try_from(value: Rc<dyn Any>) -> Result<Self, Self::Error> {
		Rc::downcast::<CellBody<T>>(value).map(|body| Cell { body })
	}
}

pub struct CellBody<T> {
	slot: RefCell<Slot<T>>,
	inner: RefCell<CellInner<T>>,
}

struct Slot<T> {
	version: Version,
	value: Hashed<T>,
}

struct CellInner<T> {
	node: NodeState,
	notify_pending: bool,
	hook: Option<ScheduleFn>,
	this: Weak<CellBody<T>>,
}

impl<T> Clone for Cell<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

impl<T> Default for Cell<T>
where
	T: Default + Hash + 'static,
{
	fn default() -> Self {
		Cell::new(Default::default())
	}
}

pub trait Toggle {
	fn toggle(&mut self);
}

impl Toggle for bool {
	fn toggle(&mut self) {
		*self = !*self
	}
}

impl<T> Cell<T>
where
	T: 'static,
{
	pub fn new(value: T) -> Self
	where
		T: Hash,
	{
		Self::with_hook(value, None)
	}

	/// A cell with its own notification hook, overriding the process
	/// hook installed via [`crate::set_schedule_hook`].
	pub fn with_hook(value: T, hook: Option<ScheduleFn>) -> Self
	where
		T: Hash,
	{
		Cell {
			body: Rc::new_cyclic(|this| CellBody {
				slot: RefCell::new(Slot {
					version: Version::default(),
					value: Hashed::new(value),
				}),
				inner: RefCell::new(CellInner {
					node: NodeState::default(),
					notify_pending: false,
					hook,
					this: this.clone(),
				}),
			}),
		}
	}

	pub fn map<F, R>(&self, func: F) -> Formula<R>
	where
		F: Fn(&T) -> R + 'static,
		R: Hash + 'static,
	{
		let this = self.body.clone();
		Formula::new(Box::new(move |cx| {
			let value = this.get(cx);
			func(&*value)
		}))
	}

	#[inline]
	pub fn get<'a>(&'a self, cx: &'a impl AsRef<Evaluation>) -> Ref<'a, T> {
		self.body.get(cx.as_ref())
	}

	#[inline]
	pub fn get_once(&self) -> Ref<'_, T> {
		self.body.get_once()
	}

	#[inline]
	pub fn set(&self, value: T) -> Result<(), WriteError>
	where
		T: Hash,
	{
		self.body.replace(value).map(|_| ())
	}

	#[inline]
	pub fn replace(&self, value: T) -> Result<T, WriteError>
	where
		T: Hash,
	{
		self.body.replace(value)
	}

	#[inline]
	pub fn update(&self, func: impl FnOnce(&mut T)) -> Result<(), WriteError>
	where
		T: Hash,
	{
		self.body.update(func)
	}

	#[inline]
	pub fn toggle(&self) -> Result<(), WriteError>
	where
		T: Toggle + Hash,
	{
		self.update(T::toggle)
	}

	pub fn add_listener(&self, listener: Listener) {
		self.body.inner.borrow_mut().node.add_listener(listener);
	}

	pub fn remove_listener(&self, listener: &Listener) {
		self.body.inner.borrow_mut().node.remove_listener(listener);
	}

	pub fn latest_version(&self) -> Version {
		self.body.slot.borrow().version
	}
}

impl<T: 'static> CellBody<T> {
	pub fn get_once(&self) -> Ref<'_, T> {
		Ref::map(self.slot.borrow(), |slot| &slot.value.value)
	}

	pub fn get<'a>(&'a self, cx: &'_ Evaluation) -> Ref<'a, T> {
		let slot = self.slot.borrow();

		{
			let inner = self.inner.borrow();
			cx.record(inner.this.upgrade().unwrap(), slot.version);
		}

		Ref::map(slot, |slot| &slot.value.value)
	}

	pub fn replace(&self, value: T) -> Result<T, WriteError>
	where
		T: Hash,
	{
		if txn::evaluating() {
			return Err(WriteError);
		}

		let mut slot = self.slot.borrow_mut();
		let next = Hashed::new(value);
		let changed = next.hash != slot.value.hash;

		let old = std::mem::replace(&mut slot.value, next);
		if changed {
			slot.version.bump();
			std::mem::drop(slot);
			self.schedule_notify();
		}

		Ok(old.value)
	}

	pub fn update(&self, func: impl FnOnce(&mut T)) -> Result<(), WriteError>
	where
		T: Hash,
	{
		if txn::evaluating() {
			return Err(WriteError);
		}

		let mut slot = self.slot.borrow_mut();
		func(&mut slot.value.value);
		if slot.value.rehash() {
			slot.version.bump();
			std::mem::drop(slot);
			self.schedule_notify();
		}

		Ok(())
	}

	/// Writes landing while a fanout is already pending coalesce into
	/// it; the version has bumped already, so reads between the write
	/// and the delivery observe the newest value.
	fn schedule_notify(&self) {
		let mut inner = self.inner.borrow_mut();
		if inner.notify_pending {
			return;
		}
		inner.notify_pending = true;

		let weak = inner.this.clone();
		let hook = inner.hook.clone();
		std::mem::drop(inner);

		scheduler::schedule_with(
			hook,
			Box::new(move || {
				if let Some(body) = weak.upgrade() {
					body.deliver();
				}
			}),
		);
	}

	fn deliver(&self) {
		let fanout = {
			let mut inner = self.inner.borrow_mut();
			inner.notify_pending = false;
			inner.node.snapshot()
		};
		fanout.run();
	}
}

impl<T: 'static> Source for CellBody<T> {
	fn latest_version(&self) -> Version {
		self.slot.borrow().version
	}

	fn add_dependent(&self, dependent: Weak<dyn Dependent>) {
		self.inner.borrow_mut().node.add_dependent(dependent);
	}

	fn remove_dependent(&self, dependent: &Weak<dyn Dependent>) {
		self.inner.borrow_mut().node.remove_dependent(dependent);
	}
}

impl<T> Access<T> for CellBody<T>
where
	T: 'static,
{
	fn get(&self, cx: &Evaluation) -> Result<crate::value::Ref<'_, T>, crate::Fault> {
		Ok(crate::value::Ref::Cell(CellBody::get(self, cx)))
	}

	fn get_once(&self) -> Result<crate::value::Ref<'_, T>, crate::Fault> {
		Ok(crate::value::Ref::Cell(CellBody::get_once(self)))
	}
}

impl<T> From<Cell<T>> for Value<T>
where
	T: 'static,
{
	fn from(cell: Cell<T>) -> Self {
		Value::new(cell.body)
	}
}

impl<T> Hash for Cell<T>
where
	T: Hash,
{
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		state.write_u64(self.body.slot.borrow().value.hash);
	}
}

impl<T> Debug for Cell<T>
where
	T: 'static + Debug,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.get_once().fmt(f)
	}
}
