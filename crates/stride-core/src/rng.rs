//! Injectable randomness for plan generation.

/// Source of uniform random choices.
///
/// Implemented for every [`rand::Rng`], so callers pass a seeded
/// `StdRng` in tests and an OS-seeded one in production.
pub trait RandomSource {
    /// Return an index in `0..len`. Callers never pass `len == 0`.
    fn pick_index(&mut self, len: usize) -> usize;
}

impl<R: rand::Rng + ?Sized> RandomSource for R {
    fn pick_index(&mut self, len: usize) -> usize {
        self.random_range(0..len)
    }
}

/// Pick one element uniformly at random, or `None` for an empty slice.
pub fn choose<'a, T, R>(rng: &mut R, items: &'a [T]) -> Option<&'a T>
where
    R: RandomSource + ?Sized,
{
    if items.is_empty() {
        None
    } else {
        items.get(rng.pick_index(items.len()))
    }
}
