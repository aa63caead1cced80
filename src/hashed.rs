use std::fmt::Debug;
use std::hash::Hash;
use std::ops::Deref;

/// A value paired with its fxhash fingerprint. Fingerprint equality is
/// the change predicate everywhere in the engine; the fingerprint can
/// outlive the value itself (see the completion cache), which is what
/// lets an invalidated node drop its payload and still detect
/// recomputed-to-equal results.
pub struct Hashed<T> {
	pub value: T,
	pub hash: u64,
}

impl<T> Hashed<T> {
	pub fn new(value: T) -> Self
	where
		T: Hash,
	{
		let hash = fingerprint(&value);
		Self { value, hash }
	}

	/// Recompute the fingerprint after an in-place mutation. Returns
	/// true when the value changed under the predicate.
	pub fn rehash(&mut self) -> bool
	where
		T: Hash,
	{
		let hash = fingerprint(&self.value);
		if self.hash == hash {
			return false;
		}
		self.hash = hash;
		true
	}
}

pub fn fingerprint<T: Hash>(value: &T) -> u64 {
	fxhash::hash64(value)
}

impl<T> Deref for Hashed<T> {
	type Target = T;
	fn deref(&self) -> &Self::Target {
		&self.value
	}
}

impl<T> Debug for Hashed<T>
where
	T: Debug,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.value.fmt(f)
	}
}
