use crate::api::reduce::{ReduceContext, Reducer};
use crate::core::grouped::GroupedSource;
use crate::core::side_state::SideState;
use crate::framework::errors::{FerrumRefineryError, Result};
use ferrum_deposit::partition::PartitionReader;
use ferrum_deposit::sink::OutputSink;
use std::fmt::Debug;
use std::hash::Hash;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReduceSummary {
    pub invocation_id: Uuid,
    pub groups: u64,
    pub values_read: u64,
    pub records_written: u64,
    pub outcome: bool,
}

/// A group's output is written once its reducer returns. The sink is closed on
/// every exit path.
pub struct ReduceDriver<K, S, Src, R, W> {
    invocation_id: Uuid,
    source: Src,
    reducer: R,
    sink: W,
    side_state: Option<SideState<K, S>>,
    summary_output: Option<Box<dyn Write + Send>>,
    cancelled: Option<Arc<AtomicBool>>,
}

impl<K, S, Src, R, W> ReduceDriver<K, S, Src, R, W>
where
    K: Hash + Eq + Clone + Debug,
{
    pub fn new(source: Src, reducer: R, sink: W) -> Self {
        ReduceDriver {
            invocation_id: Uuid::new_v4(),
            source,
            reducer,
            sink,
            side_state: None,
            summary_output: None,
            cancelled: None,
        }
    }

    pub fn invocation_id(&self) -> Uuid {
        self.invocation_id
    }

    pub fn with_side_state(mut self, side_state: SideState<K, S>) -> Self {
        self.side_state = Some(side_state);
        self
    }

    pub fn with_side_input<P>(self, reader: P) -> Result<Self>
    where
        P: PartitionReader<K, S>,
    {
        let side_state = SideState::load(reader)?;
        Ok(self.with_side_state(side_state))
    }

    pub fn with_summary_output(mut self, output: Box<dyn Write + Send>) -> Self {
        self.summary_output = Some(output);
        self
    }

    pub fn with_cancellation(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = Some(cancelled);
        self
    }

    pub fn run<V, FK, FV>(self) -> Result<ReduceSummary>
    where
        Src: GroupedSource<K, V>,
        R: Reducer<K, V, FK, FV, S>,
        W: OutputSink<FK, FV>,
    {
        let ReduceDriver {
            invocation_id,
            mut source,
            mut reducer,
            mut sink,
            mut side_state,
            summary_output,
            cancelled,
        } = self;

        info!("reduce invocation {} started", invocation_id);
        let mut summary = ReduceSummary {
            invocation_id,
            groups: 0,
            values_read: 0,
            records_written: 0,
            outcome: true,
        };

        let driven = drive(
            &mut summary,
            &mut source,
            &mut reducer,
            &mut sink,
            side_state.as_mut(),
            cancelled.as_deref(),
        );
        let closed = sink.close();

        match (driven, closed) {
            (Err(err), closed) => {
                if let Err(close_err) = closed {
                    warn!("closing sink after failure: {}", close_err);
                }
                error!("reduce invocation {} failed: {}", invocation_id, err);
                Err(err)
            }
            (Ok(()), Err(close_err)) => {
                error!("reduce invocation {} failed to close sink", invocation_id);
                Err(FerrumRefineryError::WriteFailure(format!(
                    "closing output: {}",
                    close_err
                )))
            }
            (Ok(()), Ok(())) => {
                if let Some(output) = summary_output {
                    write_summary(output, summary.outcome)?;
                }
                info!(
                    "reduce invocation {} finished: {} groups, {} values, {} records written, outcome {}",
                    invocation_id,
                    summary.groups,
                    summary.values_read,
                    summary.records_written,
                    summary.outcome
                );
                Ok(summary)
            }
        }
    }
}

fn drive<K, V, S, FK, FV, Src, R, W>(
    summary: &mut ReduceSummary,
    source: &mut Src,
    reducer: &mut R,
    sink: &mut W,
    mut side_state: Option<&mut SideState<K, S>>,
    cancelled: Option<&AtomicBool>,
) -> Result<()>
where
    K: Hash + Eq + Clone + Debug,
    Src: GroupedSource<K, V>,
    R: Reducer<K, V, FK, FV, S>,
    W: OutputSink<FK, FV>,
{
    loop {
        if cancelled.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
            warn!("reduce invocation {} cancelled", summary.invocation_id);
            return Err(FerrumRefineryError::Cancelled);
        }
        if !source.has_more_keys()? {
            return Ok(());
        }

        let key = source.current_key()?.clone();
        debug!("reducing key {:?}", key);
        if let Some(state) = side_state.as_deref() {
            state.require(&key)?;
        }

        let mut context = ReduceContext::new(&key, side_state.as_deref_mut());
        let mut values = source.values_for_current_key();
        let reduced = reducer.reduce(&key, &mut values, &mut context);
        summary.values_read += values.consumed();
        if let Some(err) = values.take_error() {
            return Err(err);
        }
        reduced.map_err(|err| reduce_failure(&key, err))?;

        let (emitted, outcome) = context.into_parts();
        for (out_key, out_value) in emitted.iter() {
            sink.write(out_key, out_value).map_err(|err| {
                FerrumRefineryError::WriteFailure(format!("while reducing key {:?}: {}", key, err))
            })?;
            summary.records_written += 1;
        }
        summary.groups += 1;
        summary.outcome &= outcome;
    }
}

fn reduce_failure<K: Debug>(key: &K, err: anyhow::Error) -> FerrumRefineryError {
    match err.downcast::<FerrumRefineryError>() {
        Ok(err @ FerrumRefineryError::MissingSideState(_)) => err,
        Ok(err @ FerrumRefineryError::ReadFailure(_)) => err,
        Ok(err) => FerrumRefineryError::ReduceFailure(format!("key {:?}: {}", key, err)),
        Err(err) => FerrumRefineryError::ReduceFailure(format!("key {:?}: {:#}", key, err)),
    }
}

fn write_summary(mut output: Box<dyn Write + Send>, outcome: bool) -> Result<()> {
    write!(output, "{}", outcome)
        .and_then(|_| output.flush())
        .map_err(|err| FerrumRefineryError::WriteFailure(format!("summary output: {}", err)))
}
