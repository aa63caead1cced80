use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::rc::{Rc, Weak};

/// `Rc` wrapper compared, ordered and hashed by pointer identity, so
/// trait objects can key ordered maps with stable iteration order.
pub struct RcIdent<T: ?Sized> {
	ptr: Rc<T>,
}

impl<T: ?Sized> RcIdent<T> {
	pub fn new(ptr: Rc<T>) -> Self {
		RcIdent { ptr }
	}
}

impl<T: ?Sized> Clone for RcIdent<T> {
	fn clone(&self) -> Self {
		RcIdent {
			ptr: self.ptr.clone(),
		}
	}
}

impl<T: ?Sized> Deref for RcIdent<T> {
	type Target = Rc<T>;
	fn deref(&self) -> &Self::Target {
		&self.ptr
	}
}

impl<T: ?Sized> PartialEq for RcIdent<T> {
	fn eq(&self, other: &Self) -> bool {
		Rc::as_ptr(&self.ptr).eq(&Rc::as_ptr(&other.ptr))
	}
}

impl<T: ?Sized> Eq for RcIdent<T> {}

impl<T: ?Sized> Ord for RcIdent<T> {
	fn cmp(&self, other: &Self) -> Ordering {
		Rc::as_ptr(&self.ptr).cmp(&Rc::as_ptr(&other.ptr))
	}
}

impl<T: ?Sized> PartialOrd for RcIdent<T> {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl<T: ?Sized> Hash for RcIdent<T> {
	fn hash<H: Hasher>(&self, state: &mut H) {
		(Rc::as_ptr(&self.ptr) as *const ()).hash(state);
	}
}

/// `Weak` counterpart of [`RcIdent`]. Identity survives the referent,
/// so a dead entry can still be located and removed.
pub struct WeakIdent<T: ?Sized> {
	ptr: Weak<T>,
}

impl<T: ?Sized> WeakIdent<T> {
	pub fn new(ptr: Weak<T>) -> Self {
		WeakIdent { ptr }
	}
}

impl<T: ?Sized> Clone for WeakIdent<T> {
	fn clone(&self) -> Self {
		WeakIdent {
			ptr: self.ptr.clone(),
		}
	}
}

impl<T: ?Sized> Deref for WeakIdent<T> {
	type Target = Weak<T>;
	fn deref(&self) -> &Self::Target {
		&self.ptr
	}
}

impl<T: ?Sized> PartialEq for WeakIdent<T> {
	fn eq(&self, other: &Self) -> bool {
		Weak::as_ptr(&self.ptr).eq(&Weak::as_ptr(&other.ptr))
	}
}

impl<T: ?Sized> Eq for WeakIdent<T> {}

impl<T: ?Sized> Ord for WeakIdent<T> {
	fn cmp(&self, other: &Self) -> Ordering {
		Weak::as_ptr(&self.ptr).cmp(&Weak::as_ptr(&other.ptr))
	}
}

impl<T: ?Sized> PartialOrd for WeakIdent<T> {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl<T: ?Sized> Hash for WeakIdent<T> {
	fn hash<H: Hasher>(&self, state: &mut H) {
		(Weak::as_ptr(&self.ptr) as *const ()).hash(state);
	}
}
