use std::ops::Deref;
use std::rc::Rc;

use crate::completion::Fault;
use crate::{Evaluation, Source};

/// Type-erased read handle over any node kind. Cells can never fault,
/// but the erased surface is uniformly fallible so one `Value` type
/// covers formulas and subscriptions too.
pub struct Value<T> {
	value: Rc<dyn Access<T>>,
}

impl<T> Clone for Value<T> {
	fn clone(&self) -> Self {
		Value {
			value: self.value.clone(),
		}
	}
}

impl<T> Value<T>
where
	T: 'static,
{
	pub fn new(value: Rc<dyn Access<T>>) -> Self {
		Value { value }
	}

	pub fn get<'a>(&'a self, cx: &'a impl AsRef<Evaluation>) -> Result<Ref<'a, T>, Fault> {
		self.value.get(cx.as_ref())
	}

	pub fn get_once(&self) -> Result<Ref<'_, T>, Fault> {
		self.value.get_once()
	}
}

pub enum Ref<'a, T> {
	Plain(&'a T),
	Cell(std::cell::Ref<'a, T>),
}

impl<'a, T> Deref for Ref<'a, T> {
	type Target = T;

	fn deref(&self) -> &Self::Target {
		match self {
			Ref::Cell(guard) => guard.deref(),
			Ref::Plain(value) => value,
		}
	}
}

pub trait Access<T>: Source {
	fn get(&self, cx: &Evaluation) -> Result<Ref<'_, T>, Fault>;
	fn get_once(&self) -> Result<Ref<'_, T>, Fault>;
}
