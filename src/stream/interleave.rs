use super::{Next, Stream};
use crate::combinator::{any, OneOf2, OneOf3, OneOf4, OneOf5, OneOf6};
use crate::coroutine;
use crate::error::Exception;
use crate::wait::Wait;

/// Merged view over a tuple of [Stream]s. See [interleave].
///
/// It holds no buffer of its own. Dropping it, or a pending [Next::next] of it, leaves unread
/// values in their source streams.
#[derive(Clone)]
pub struct Interleave<S> {
    streams: S,
}

/// Merges a tuple of 2 to 6 streams.
///
/// Each [Next::next] takes the oldest value of the first non-empty stream in tuple order, tagged
/// by its position, so order within each source is preserved.
pub fn interleave<S>(streams: S) -> Interleave<S>
where
    Interleave<S>: Next,
{
    Interleave { streams }
}

macro_rules! interleave_tuple {
    ($name:ident; $($T:ident $s:ident),+) => {
        impl<$($T: 'static),+> Next for Interleave<($(Stream<$T>,)+)> {
            type Item = $name<$($T),+>;

            fn next(&self) -> Wait<Self::Item> {
                let ($($s,)+) = self.streams.clone();
                coroutine::spawn(async move {
                    loop {
                        $(
                            if let Some(value) = $s.try_next() {
                                return Ok::<_, Exception>($name::$T(value));
                            }
                        )+
                        any(($($s.readable(),)+)).await?;
                    }
                })
            }
        }
    };
}

interleave_tuple!(OneOf2; A a, B b);
interleave_tuple!(OneOf3; A a, B b, C c);
interleave_tuple!(OneOf4; A a, B b, C c, D d);
interleave_tuple!(OneOf5; A a, B b, C c, D d, E e);
interleave_tuple!(OneOf6; A a, B b, C c, D d, E e, F f);
