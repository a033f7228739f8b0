use std::rc::Rc;

use super::{Wait, WaitPromise};

/// Links `source` to `target`: the first of value or exception set on `source` resolves
/// `target` unless it is resolved already.
///
/// Callbacks live on `source`, so cancelling `source` cuts the link. They refer to `target`
/// weakly, the link does not keep `target` alive.
pub(crate) fn disjunctive<T, U, F>(source: &mut Wait<T>, target: &WaitPromise<U>, f: F)
where
    T: 'static,
    U: 'static,
    F: FnOnce(&T) -> U + 'static,
{
    let on_value = Rc::downgrade(&target.state);
    source.on_value(move |value| {
        if let Some(state) = on_value.upgrade() {
            if !state.is_resolved() {
                state.set_value(f(value));
            }
        }
    });
    let on_exception = Rc::downgrade(&target.state);
    source.on_exception(move |err| {
        if let Some(state) = on_exception.upgrade() {
            state.set_exception(err.clone());
        }
    });
}
