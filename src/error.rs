use std::error::Error;
use std::fmt;
use std::rc::Rc;

use static_assertions::assert_not_impl_any;

/// Type-erased failure carried by a [crate::Wait] in place of a value.
///
/// It is cheap to clone: every awaiter of a failed wait observes the same underlying error.
/// Any [std::error::Error] converts into it, so `?` works inside coroutine bodies.
#[derive(Clone)]
pub struct Exception {
    error: Rc<dyn Error + 'static>,
}

assert_not_impl_any!(Exception: Send, Sync);

impl Exception {
    /// Wraps given error.
    pub fn new<E: Error + 'static>(err: E) -> Self {
        Exception { error: Rc::new(err) }
    }

    /// Constructs an exception from message alone.
    pub fn msg(message: impl Into<String>) -> Self {
        Exception::new(Failure::new(message))
    }

    /// Returns true if the wrapped error is of type `E`.
    pub fn is<E: Error + 'static>(&self) -> bool {
        self.error.is::<E>()
    }

    /// Returns the wrapped error if it is of type `E`.
    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.error.downcast_ref::<E>()
    }

    /// Returns the wrapped error.
    pub fn as_error(&self) -> &(dyn Error + 'static) {
        self.error.as_ref()
    }

    /// Returns true if both refer to the same raised error.
    pub fn same(&self, other: &Exception) -> bool {
        Rc::ptr_eq(&self.error, &other.error)
    }
}

impl<E: Error + 'static> From<E> for Exception {
    fn from(err: E) -> Self {
        Exception::new(err)
    }
}

impl fmt::Debug for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Exception({:?})", self.error)
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

/// Error with nothing but a message.
#[derive(Clone, PartialEq, Eq)]
pub struct Failure {
    message: String,
}

impl Failure {
    pub fn new(message: impl Into<String>) -> Self {
        Failure { message: message.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.message
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failure({:?})", self.message)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for Failure {}
