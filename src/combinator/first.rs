use crate::coroutine;
use crate::error::Exception;
use crate::wait::{disjunctive, Wait, WaitPromise};

/// Waits that could race in [first].
pub trait First {
    type Output: 'static;

    fn first(self) -> Wait<Self::Output>;
}

/// Resolves to whichever input resolves first.
///
/// Inputs are linked in order. When several are ready already, or become ready within one
/// [crate::WaitPromise::set_value] cascade, the earliest fulfilled wins. Exception from any
/// input before a winner is chosen propagates. Losers are cancelled once winner is taken.
///
/// A tuple of 2 to 6 waits resolves to `OneOfN`, a [Vec] resolves to `(index, value)`. An empty
/// [Vec] never resolves.
pub fn first<S: First>(waits: S) -> Wait<S::Output> {
    waits.first()
}

macro_rules! one_of {
    ($name:ident, $n:literal; $($T:ident $i:tt),+) => {
        #[doc = concat!("Outcome of [first] over ", stringify!($n), " waits, tagged by input position.")]
        #[derive(Clone, Debug, PartialEq, Eq, Hash)]
        pub enum $name<$($T),+> {
            $($T($T)),+
        }

        impl<$($T),+> $name<$($T),+> {
            /// Position of input this value comes from.
            pub fn index(&self) -> usize {
                match self {
                    $(Self::$T(_) => $i),+
                }
            }
        }
    };
}

one_of!(OneOf2, 2; A 0, B 1);
one_of!(OneOf3, 3; A 0, B 1, C 2);
one_of!(OneOf4, 4; A 0, B 1, C 2, D 3);
one_of!(OneOf5, 5; A 0, B 1, C 2, D 3, E 4);
one_of!(OneOf6, 6; A 0, B 1, C 2, D 3, E 4, F 5);

macro_rules! first_tuple {
    ($name:ident; $($T:ident $w:ident $i:tt),+) => {
        impl<$($T: 'static),+> First for ($(Wait<$T>,)+) {
            type Output = $name<$($T),+>;

            fn first(self) -> Wait<Self::Output> {
                let ($(mut $w,)+) = self;
                let winner = WaitPromise::<usize>::new();
                $(disjunctive(&mut $w, &winner, |_| $i);)+
                let chosen = winner.wait();
                coroutine::spawn(async move {
                    let index = chosen.await?;
                    $(
                        if index == $i {
                            return Ok::<_, Exception>($name::$T($w.await?));
                        }
                    )+
                    unreachable!("first: winner index {} out of range", index)
                })
            }
        }
    };
}

first_tuple!(OneOf2; A a 0, B b 1);
first_tuple!(OneOf3; A a 0, B b 1, C c 2);
first_tuple!(OneOf4; A a 0, B b 1, C c 2, D d 3);
first_tuple!(OneOf5; A a 0, B b 1, C c 2, D d 3, E e 4);
first_tuple!(OneOf6; A a 0, B b 1, C c 2, D d 3, E e 4, F f 5);

impl<T: 'static> First for Vec<Wait<T>> {
    type Output = (usize, T);

    fn first(mut self) -> Wait<(usize, T)> {
        let winner = WaitPromise::<usize>::new();
        for (i, wait) in self.iter_mut().enumerate() {
            disjunctive(wait, &winner, move |_| i);
        }
        let chosen = winner.wait();
        coroutine::spawn(async move {
            let index = chosen.await?;
            let value = self.swap_remove(index).await?;
            Ok::<_, Exception>((index, value))
        })
    }
}
