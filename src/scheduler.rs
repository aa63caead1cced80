use std::any::Any;
use std::cell::{Cell, RefCell};
use std::panic::resume_unwind;
use std::rc::Rc;

pub type Task = Box<dyn FnOnce()>;
pub type ScheduleFn = Rc<dyn Fn(Task)>;

thread_local! {
	static HOOK: RefCell<Option<ScheduleFn>> = RefCell::new(None);
	static FANOUT_DEPTH: Cell<usize> = Cell::new(0);
	static DEFERRED: RefCell<Vec<Box<dyn Any + Send>>> = RefCell::new(Vec::new());
}

/// Install a process-wide hook used to defer notification fanout and
/// listener panic delivery. `None` restores the inline default. On
/// wasm32 the [`crate::microtask::queue`] adapter is a ready-made
/// hook.
pub fn set_schedule_hook(hook: Option<ScheduleFn>) {
	HOOK.with(|slot| *slot.borrow_mut() = hook);
}

/// Run `task` through the installed hook, or inline when none is
/// installed.
pub fn schedule(task: Task) {
	let hook = HOOK.with(|slot| slot.borrow().clone());
	match hook {
		Some(hook) => (*hook)(task),
		None => task(),
	}
}

/// Cells constructed with their own hook bypass the process hook.
pub(crate) fn schedule_with(hook: Option<ScheduleFn>, task: Task) {
	match hook {
		Some(hook) => (*hook)(task),
		None => schedule(task),
	}
}

pub(crate) fn defer_panic(payload: Box<dyn Any + Send>) {
	DEFERRED.with(|pending| pending.borrow_mut().push(payload));
}

/// Tracks fanout nesting. Captured listener panics are handed to the
/// scheduler only when the outermost fanout unwinds its guard, so the
/// whole cascade is delivered before any payload resumes.
pub(crate) fn fanout_scope() -> FanoutGuard {
	FANOUT_DEPTH.with(|depth| depth.set(depth.get() + 1));
	FanoutGuard
}

pub(crate) struct FanoutGuard;

impl Drop for FanoutGuard {
	fn drop(&mut self) {
		let depth = FANOUT_DEPTH.with(|depth| {
			let left = depth.get() - 1;
			depth.set(left);
			left
		});

		if depth == 0 && !std::thread::panicking() {
			let pending = DEFERRED.with(|pending| std::mem::take(&mut *pending.borrow_mut()));
			for payload in pending {
				schedule(Box::new(move || resume_unwind(payload)));
			}
		}
	}
}
