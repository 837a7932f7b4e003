//! Optional rayon fan-out.
//!
//! With the `parallel` feature, `iter_maybe_parallel!` turns a collection into
//! a rayon parallel iterator; otherwise into a plain iterator. Callers import
//! `rayon::iter::ParallelIterator` behind the same feature gate. Both paths
//! collect in input order.

macro_rules! iter_maybe_parallel {
    ($expr:expr) => {{
        #[cfg(feature = "parallel")]
        {
            use rayon::iter::IntoParallelIterator;

            IntoParallelIterator::into_par_iter($expr)
        }
        #[cfg(not(feature = "parallel"))]
        {
            IntoIterator::into_iter($expr)
        }
    }};
}

pub(crate) use iter_maybe_parallel;
