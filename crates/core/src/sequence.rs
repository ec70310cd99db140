//! Ordered pipeline engine
//!
//! A [`Sequence`] holds named stages keyed by a unique non-negative order.
//! Executing it threads a state value through every stage, lowest order
//! first or highest order first depending on the [`ExecutionPolicy`]. A
//! stage is either a function or a nested sequence that runs to completion
//! as a single step of its parent.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use tracing::Level;

/// Prefix every stage function name must carry
pub const STAGE_PREFIX: &str = "seq";

type StageFn<S> = Box<dyn FnMut(S) -> Result<S>>;
type EndHook<S> = Box<dyn FnMut(&S)>;

/// A named unit of work
pub struct SequenceFunction<S> {
    name: String,
    func: StageFn<S>,
}

impl<S> SequenceFunction<S> {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One registered entry of a sequence
pub enum Stage<S> {
    Function(SequenceFunction<S>),
    Sub(Sequence<S>),
}

impl<S> Stage<S> {
    pub fn name(&self) -> &str {
        match self {
            Stage::Function(f) => f.name(),
            Stage::Sub(seq) => seq.name(),
        }
    }

    fn kind(&self) -> StageKind {
        match self {
            Stage::Function(_) => StageKind::Function,
            Stage::Sub(_) => StageKind::Sequence,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Function,
    Sequence,
}

/// Inspection view of a registered stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageInfo {
    pub name: String,
    pub order: u32,
    pub kind: StageKind,
}

/// Direction in which stages run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionPolicy {
    #[default]
    IncreasingOrder,
    DecreasingOrder,
}

impl ExecutionPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionPolicy::IncreasingOrder => "increasing_order",
            ExecutionPolicy::DecreasingOrder => "decreasing_order",
        }
    }
}

impl FromStr for ExecutionPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "increasing_order" => Ok(ExecutionPolicy::IncreasingOrder),
            "decreasing_order" => Ok(ExecutionPolicy::DecreasingOrder),
            other => Err(Error::InvalidExecutionPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for ExecutionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered, nestable pipeline over a state type `S`
pub struct Sequence<S> {
    name: String,
    stages: BTreeMap<u32, Stage<S>>,
    on_end: Option<EndHook<S>>,
}

impl<S> Sequence<S> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: BTreeMap::new(),
            on_end: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Register `func` under `name` at `order`
    ///
    /// Nothing is registered when validation fails.
    pub fn add_sequence_function<F>(&mut self, name: impl Into<String>, func: F, order: i64) -> Result<()>
    where
        F: FnMut(S) -> Result<S> + 'static,
    {
        let name = name.into();
        if !name.starts_with(STAGE_PREFIX) {
            return Err(Error::InvalidStageName(name));
        }
        let order = self.check_slot(&name, order)?;

        tracing::trace!(sequence = %self.name, stage = %name, order, "Registered stage");
        self.stages.insert(
            order,
            Stage::Function(SequenceFunction {
                name,
                func: Box::new(func),
            }),
        );
        Ok(())
    }

    /// Nest `sequence` as a single stage at `order`
    pub fn add_sub_sequence(&mut self, sequence: Sequence<S>, order: i64) -> Result<()> {
        let order = self.check_slot(sequence.name(), order)?;

        tracing::trace!(sequence = %self.name, stage = %sequence.name, order, "Registered sub-sequence");
        self.stages.insert(order, Stage::Sub(sequence));
        Ok(())
    }

    /// Callback run with the final state after every successful execution
    pub fn on_sequence_end<F>(&mut self, hook: F)
    where
        F: FnMut(&S) + 'static,
    {
        self.on_end = Some(Box::new(hook));
    }

    /// Remove every stage and the end hook
    pub fn flush_sequence(&mut self) {
        tracing::trace!(sequence = %self.name, stages = self.stages.len(), "Flushed sequence");
        self.stages.clear();
        self.on_end = None;
    }

    /// Registered stages in increasing order
    pub fn get_sequence_functions(&self) -> Vec<StageInfo> {
        self.stages
            .iter()
            .map(|(order, stage)| StageInfo {
                name: stage.name().to_string(),
                order: *order,
                kind: stage.kind(),
            })
            .collect()
    }

    /// Move the stage called `name` to `new_order`
    pub fn update_order(&mut self, name: &str, new_order: i64) -> Result<()> {
        let current = self
            .stages
            .iter()
            .find(|(_, stage)| stage.name() == name)
            .map(|(order, _)| *order)
            .ok_or_else(|| Error::StageNotFound {
                sequence: self.name.clone(),
                stage: name.to_string(),
            })?;

        let new_order = to_order(new_order)?;
        if new_order == current {
            return Ok(());
        }
        if let Some(existing) = self.stages.get(&new_order) {
            return Err(Error::DuplicateOrder {
                sequence: self.name.clone(),
                order: new_order,
                existing: existing.name().to_string(),
            });
        }

        if let Some(stage) = self.stages.remove(&current) {
            self.stages.insert(new_order, stage);
        }
        Ok(())
    }

    /// Emit one record tagged with this sequence's name
    pub fn log(&self, level: Level, message: &str, context: &[(&str, String)]) {
        let context = context
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join(" ");
        let sequence = self.name.as_str();

        match level {
            Level::ERROR => tracing::error!(sequence, context = %context, "{}", message),
            Level::WARN => tracing::warn!(sequence, context = %context, "{}", message),
            Level::INFO => tracing::info!(sequence, context = %context, "{}", message),
            Level::DEBUG => tracing::debug!(sequence, context = %context, "{}", message),
            Level::TRACE => tracing::trace!(sequence, context = %context, "{}", message),
        }
    }

    fn check_slot(&self, name: &str, order: i64) -> Result<u32> {
        let order = to_order(order)?;
        if self.stages.values().any(|stage| stage.name() == name) {
            return Err(Error::DuplicateStage {
                sequence: self.name.clone(),
                stage: name.to_string(),
            });
        }
        if let Some(existing) = self.stages.get(&order) {
            return Err(Error::DuplicateOrder {
                sequence: self.name.clone(),
                order,
                existing: existing.name().to_string(),
            });
        }
        Ok(order)
    }
}

impl<S: Clone> Sequence<S> {
    /// Run every stage in the direction given by `policy`
    ///
    /// With `pass_args` each stage receives the previous stage's output;
    /// otherwise each receives a copy of `state` and the last output is
    /// returned. Nested sequences run with the same policy. The first
    /// failing stage stops the run.
    pub fn execute_sequence(&mut self, policy: ExecutionPolicy, pass_args: bool, state: S) -> Result<S> {
        let started = Instant::now();
        tracing::debug!(
            sequence = %self.name,
            policy = %policy,
            stages = self.stages.len(),
            "Executing sequence"
        );

        let stages: Box<dyn Iterator<Item = (&u32, &mut Stage<S>)> + '_> = match policy {
            ExecutionPolicy::IncreasingOrder => Box::new(self.stages.iter_mut()),
            ExecutionPolicy::DecreasingOrder => Box::new(self.stages.iter_mut().rev()),
        };

        let mut current = state.clone();
        for (order, stage) in stages {
            let input = if pass_args { current } else { state.clone() };
            let stage_name = stage.name().to_string();
            let stage_started = Instant::now();

            let outcome = match stage {
                Stage::Function(f) => (f.func)(input),
                Stage::Sub(seq) => seq.execute_sequence(policy, pass_args, input),
            };
            let elapsed_ms = stage_started.elapsed().as_millis() as u64;

            match outcome {
                Ok(next) => {
                    tracing::debug!(
                        sequence = %self.name,
                        stage = %stage_name,
                        order = *order,
                        elapsed_ms,
                        "Stage completed"
                    );
                    current = next;
                }
                Err(e) => {
                    tracing::error!(
                        sequence = %self.name,
                        stage = %stage_name,
                        order = *order,
                        elapsed_ms,
                        error = %e.root_cause(),
                        "Stage failed"
                    );
                    return Err(Error::StageFailed {
                        sequence: self.name.clone(),
                        stage: stage_name,
                        order: *order,
                        source: Box::new(e),
                    });
                }
            }
        }

        if let Some(hook) = self.on_end.as_mut() {
            hook(&current);
        }

        tracing::debug!(
            sequence = %self.name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Sequence finished"
        );
        Ok(current)
    }
}

impl<S> fmt::Debug for Sequence<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("name", &self.name)
            .field("stages", &self.get_sequence_functions())
            .field("on_end", &self.on_end.is_some())
            .finish()
    }
}

fn to_order(order: i64) -> Result<u32> {
    u32::try_from(order).map_err(|_| Error::InvalidOrder(order))
}
