//! Argument tuples submitted by callers.
//!
//! A batch function for K arguments receives K aligned column lists, one per
//! argument position. `Arguments` is implemented for tuples of one to
//! [`MAX_ARITY`](crate::MAX_ARITY) elements and performs the row to column
//! transposition.

use std::hash::Hash;

/// An ordered, fixed-length argument tuple for one call.
///
/// Equality and hashing are structural and only used to detect duplicate
/// calls inside a batch.
pub trait Arguments: Clone + Eq + Hash + Send + 'static {
    /// One `Vec` per argument position, e.g. `(Vec<A>, Vec<B>)` for `(A, B)`.
    type Columns: Send + 'static;

    /// Number of argument positions.
    const ARITY: usize;

    /// Project rows into columns; `columns.k[i] == rows[i].k` for every k.
    fn transpose(rows: Vec<Self>) -> Self::Columns;
}

macro_rules! impl_arguments {
    ($arity:expr; $($name:ident : $idx:tt),+) => {
        impl<$($name),+> Arguments for ($($name,)+)
        where
            $($name: Clone + Eq + Hash + Send + 'static),+
        {
            type Columns = ($(Vec<$name>,)+);

            const ARITY: usize = $arity;

            fn transpose(rows: Vec<Self>) -> Self::Columns {
                let len = rows.len();
                let mut columns = ($(Vec::<$name>::with_capacity(len),)+);
                for row in rows {
                    $(columns.$idx.push(row.$idx);)+
                }
                columns
            }
        }
    };
}

impl_arguments!(1; A: 0);
impl_arguments!(2; A: 0, B: 1);
impl_arguments!(3; A: 0, B: 1, C: 2);
impl_arguments!(4; A: 0, B: 1, C: 2, D: 3);
impl_arguments!(5; A: 0, B: 1, C: 2, D: 3, E: 4);
impl_arguments!(6; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
