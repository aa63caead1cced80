use std::rc::Rc;

use proptest::prelude::*;

use reflow::{Cell, Formula, Listener, Version};

type Counter = Rc<std::cell::Cell<u32>>;

fn counter() -> Counter {
	Rc::new(std::cell::Cell::new(0))
}

#[derive(Debug, Clone)]
enum Op {
	Set1(i32),
	Set2(i32),
	ReadInner,
	ReadOuter,
	ToggleListener,
}

fn op() -> impl Strategy<Value = Op> {
	prop_oneof![
		(0..4i32).prop_map(Op::Set1),
		(0..4i32).prop_map(Op::Set2),
		Just(Op::ReadInner),
		Just(Op::ReadOuter),
		Just(Op::ToggleListener),
	]
}

/// Mirror of the push-path state the engine should be in: whether the
/// inner and outer formulas hold a valid cache, and how many times the
/// outer listener must have fired. Invalidation is edge-triggered, so
/// a change only fires the listener when the chain was valid.
struct Model {
	c1: i32,
	c2: i32,
	attached: bool,
	inner_dirty: bool,
	outer_dirty: bool,
	outer_fresh: bool,
	fires: u32,
}

impl Model {
	fn write(&mut self, changed: bool) {
		if !changed || !self.attached || self.outer_fresh {
			return;
		}
		if self.inner_dirty {
			return;
		}
		self.inner_dirty = true;
		if !self.outer_dirty {
			self.fires += 1;
		}
		self.outer_dirty = true;
	}
}

proptest! {
	#[test]
	fn graph_invariants_hold(ops in proptest::collection::vec(op(), 1..48)) {
		let c1 = Cell::new(0i32);
		let c2 = Cell::new(0i32);
		let inner_runs = counter();
		let outer_runs = counter();

		// inner reads c1 twice on purpose: repeat reads must collapse
		// to a single dependency entry and a single notification path.
		let inner = Formula::new(Box::new({
			let c1 = c1.clone();
			let c2 = c2.clone();
			let runs = inner_runs.clone();
			move |cx| {
				runs.set(runs.get() + 1);
				*c1.get(cx) + *c1.get(cx) + *c2.get(cx)
			}
		}));

		let outer = Formula::new(Box::new({
			let inner = inner.clone();
			let runs = outer_runs.clone();
			move |cx| {
				runs.set(runs.get() + 1);
				*inner.get(cx).unwrap() * 2
			}
		}));

		let fired = counter();
		let listener: Listener = {
			let fired = fired.clone();
			Rc::new(move || fired.set(fired.get() + 1))
		};

		let mut model = Model {
			c1: 0,
			c2: 0,
			attached: false,
			inner_dirty: false,
			outer_dirty: false,
			outer_fresh: true,
			fires: 0,
		};

		let mut last_c1 = Version::default();
		let mut last_c2 = Version::default();
		let mut last_inner = Version::default();
		let mut last_outer = Version::default();

		for op in ops {
			match op {
				Op::Set1(v) => {
					let changed = v != model.c1;
					c1.set(v).unwrap();
					model.c1 = v;
					model.write(changed);
				}
				Op::Set2(v) => {
					let changed = v != model.c2;
					c2.set(v).unwrap();
					model.c2 = v;
					model.write(changed);
				}
				Op::ReadInner => {
					let expected = 2 * model.c1 + model.c2;
					prop_assert_eq!(*inner.get_once().unwrap(), expected);

					// Re-reading with no intervening writes must not
					// re-run the closure.
					let runs = inner_runs.get();
					prop_assert_eq!(*inner.get_once().unwrap(), expected);
					prop_assert_eq!(inner_runs.get(), runs);

					let version = inner.latest_version();
					prop_assert!(version >= last_inner);
					last_inner = version;

					model.inner_dirty = false;
				}
				Op::ReadOuter => {
					let expected = (2 * model.c1 + model.c2) * 2;
					prop_assert_eq!(*outer.get_once().unwrap(), expected);

					let runs = outer_runs.get();
					prop_assert_eq!(*outer.get_once().unwrap(), expected);
					prop_assert_eq!(outer_runs.get(), runs);

					let version = outer.latest_version();
					prop_assert!(version >= last_outer);
					last_outer = version;

					model.inner_dirty = false;
					model.outer_dirty = false;
					model.outer_fresh = false;
				}
				Op::ToggleListener => {
					if model.attached {
						outer.remove_listener(&listener);
						model.attached = false;
					} else {
						outer.add_listener(listener.clone());
						model.attached = true;
						if model.outer_fresh {
							// Observing a never-read formula evaluates it.
							model.outer_fresh = false;
							model.inner_dirty = false;
							model.outer_dirty = false;
						}
					}
				}
			}

			// Each listener delivery happens at most once per accepted
			// write, diamond paths notwithstanding.
			prop_assert_eq!(fired.get(), model.fires);

			let v1 = c1.latest_version();
			let v2 = c2.latest_version();
			prop_assert!(v1 >= last_c1);
			prop_assert!(v2 >= last_c2);
			last_c1 = v1;
			last_c2 = v2;
		}
	}
}
