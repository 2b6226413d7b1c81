/// Must be associative and commutative.
pub trait Combiner<V> {
    fn combine(&self, existing: V, incoming: V) -> V;
}

impl<V, F> Combiner<V> for F
where
    F: Fn(V, V) -> V,
{
    fn combine(&self, existing: V, incoming: V) -> V {
        self(existing, incoming)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum NoCombiner {}

impl<V> Combiner<V> for NoCombiner {
    fn combine(&self, _existing: V, _incoming: V) -> V {
        match *self {}
    }
}
