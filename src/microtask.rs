use wasm_bindgen::prelude::*;

use crate::scheduler::Task;

#[wasm_bindgen]
extern "C" {
	#[wasm_bindgen(js_name = queueMicrotask)]
	fn queue_microtask(closure: &JsValue);
}

/// Scheduler hook deferring tasks to the host microtask queue.
/// Install with `set_schedule_hook(Some(Rc::new(microtask::queue)))`.
pub fn queue(task: Task) {
	queue_microtask(&Closure::once_into_js(move || task()));
}
