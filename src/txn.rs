use std::cell::Cell;

/// Identifier of one read transaction: a single outermost entry into
/// the engine and every nested validation it triggers. Used to
/// short-circuit repeat validation of shared nodes within one root
/// read.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub struct TxId(u64);

thread_local! {
	static CURRENT: Cell<Option<TxId>> = Cell::new(None);
	static NEXT: Cell<u64> = Cell::new(1);
	static EVALUATING: Cell<usize> = Cell::new(0);
}

/// Enter a read transaction. The outermost caller allocates a fresh
/// id and owns the frame; nested entries inherit the current id and
/// their guard tears nothing down.
pub(crate) fn enter() -> TxGuard {
	CURRENT.with(|current| match current.get() {
		Some(id) => TxGuard { id, owned: false },
		None => {
			let id = NEXT.with(|next| {
				let id = next.get();
				next.set(id + 1);
				TxId(id)
			});
			current.set(Some(id));
			TxGuard { id, owned: true }
		}
	})
}

pub(crate) fn current() -> Option<TxId> {
	CURRENT.with(|current| current.get())
}

pub(crate) struct TxGuard {
	id: TxId,
	owned: bool,
}

impl TxGuard {
	pub fn id(&self) -> TxId {
		self.id
	}
}

impl Drop for TxGuard {
	fn drop(&mut self) {
		if self.owned {
			CURRENT.with(|current| current.set(None));
		}
	}
}

/// True while any formula closure is running; cell writes are
/// rejected for the duration.
pub(crate) fn evaluating() -> bool {
	EVALUATING.with(|depth| depth.get() > 0)
}

pub(crate) fn eval_scope() -> EvalGuard {
	EVALUATING.with(|depth| depth.set(depth.get() + 1));
	EvalGuard
}

pub(crate) struct EvalGuard;

impl Drop for EvalGuard {
	fn drop(&mut self) {
		EVALUATING.with(|depth| depth.set(depth.get() - 1));
	}
}
