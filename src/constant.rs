use std::rc::{Rc, Weak};

use crate::completion::Fault;
use crate::value::{Access, Ref, Value};
use crate::{Dependent, Evaluation, Source, Version};

/// Immutable source. Stays at version zero forever and never
/// notifies, so dependent registration is a no-op.
pub struct Const<T> {
	body: Rc<ConstBody<T>>,
}

struct ConstBody<T> {
	value: T,
}

impl<T> Clone for Const<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

impl<T> Const<T> {
	pub fn new(value: T) -> Self {
		Const {
			body: Rc::new(ConstBody { value }),
		}
	}

	pub fn get(&self) -> &T {
		&self.body.value
	}
}

impl<T> Source for ConstBody<T>
where
	T: 'static,
{
	fn latest_version(&self) -> Version {
		Version::default()
	}

	fn add_dependent(&self, _: Weak<dyn Dependent>) {}
	fn remove_dependent(&self, _: &Weak<dyn Dependent>) {}
}

impl<T> Access<T> for ConstBody<T>
where
	T: 'static,
{
	fn get(&self, _: &Evaluation) -> Result<Ref<'_, T>, Fault> {
		Ok(Ref::Plain(&self.value))
	}

	fn get_once(&self) -> Result<Ref<'_, T>, Fault> {
		Ok(Ref::Plain(&self.value))
	}
}

impl<T> From<Const<T>> for Value<T>
where
	T: 'static,
{
	fn from(constant: Const<T>) -> Self {
		Value::new(constant.body)
	}
}
