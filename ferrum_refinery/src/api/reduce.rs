use crate::core::grouped::GroupValues;
use crate::core::side_state::SideState;
use crate::framework::errors::{FerrumRefineryError, Result};
use std::fmt::Debug;
use std::hash::Hash;

/// Errors are fatal to the invocation. A forwarded `FerrumRefineryError` keeps
/// its kind.
pub trait Reducer<IntermediateKey, IntermediateValue, FinalKey, FinalValue, S = ()> {
    fn reduce(
        &mut self,
        key: &IntermediateKey,
        values: &mut GroupValues<'_, IntermediateKey, IntermediateValue>,
        context: &mut ReduceContext<'_, IntermediateKey, S, FinalKey, FinalValue>,
    ) -> anyhow::Result<()>;
}

impl<IK, IV, FK, FV, S, R> Reducer<IK, IV, FK, FV, S> for &mut R
where
    R: Reducer<IK, IV, FK, FV, S> + ?Sized,
{
    fn reduce(
        &mut self,
        key: &IK,
        values: &mut GroupValues<'_, IK, IV>,
        context: &mut ReduceContext<'_, IK, S, FK, FV>,
    ) -> anyhow::Result<()> {
        (**self).reduce(key, values, context)
    }
}

impl<IK, IV, FK, FV, S, R> Reducer<IK, IV, FK, FV, S> for Box<R>
where
    R: Reducer<IK, IV, FK, FV, S> + ?Sized,
{
    fn reduce(
        &mut self,
        key: &IK,
        values: &mut GroupValues<'_, IK, IV>,
        context: &mut ReduceContext<'_, IK, S, FK, FV>,
    ) -> anyhow::Result<()> {
        (**self).reduce(key, values, context)
    }
}

pub struct ReduceContext<'a, K, S, FinalKey, FinalValue> {
    key: &'a K,
    side_state: Option<&'a mut SideState<K, S>>,
    emitted: Vec<(FinalKey, FinalValue)>,
    outcome: bool,
}

impl<'a, K, S, FinalKey, FinalValue> ReduceContext<'a, K, S, FinalKey, FinalValue> {
    pub fn new(key: &'a K, side_state: Option<&'a mut SideState<K, S>>) -> Self {
        ReduceContext {
            key,
            side_state,
            emitted: Vec::new(),
            outcome: true,
        }
    }

    pub fn emit(&mut self, key: FinalKey, value: FinalValue) {
        self.emitted.push((key, value));
    }

    /// Repeated reports are ANDed; no report counts as `true`.
    pub fn report_outcome(&mut self, outcome: bool) {
        self.outcome &= outcome;
    }

    pub fn outcome(&self) -> bool {
        self.outcome
    }

    pub fn emitted(&self) -> &[(FinalKey, FinalValue)] {
        &self.emitted
    }

    pub(crate) fn into_parts(self) -> (Vec<(FinalKey, FinalValue)>, bool) {
        (self.emitted, self.outcome)
    }
}

impl<'a, K, S, FinalKey, FinalValue> ReduceContext<'a, K, S, FinalKey, FinalValue>
where
    K: Hash + Eq + Debug,
{
    pub fn side_state(&mut self) -> Result<&mut S> {
        match self.side_state.as_deref_mut() {
            Some(state) => state.require_mut(self.key),
            None => Err(FerrumRefineryError::MissingSideState(format!(
                "{:?} (no side input loaded)",
                self.key
            ))),
        }
    }
}
