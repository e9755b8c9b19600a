use std::fmt;
use std::sync::Arc;

use crate::kernel::error::BoxError;
use crate::kernel::factory::ServiceContext;

/// Result of polling a condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionOutcome {
    Satisfied,
    /// Not yet satisfied, with a reason for diagnostics
    Unsatisfied(String),
}

/// Gate polled before a service starts or stops
pub trait ServiceCondition: Send + Sync {
    fn description(&self) -> String;

    /// Poll the condition. An error counts as unsatisfied.
    fn evaluate(&self, context: &ServiceContext<'_>) -> Result<ConditionOutcome, BoxError>;
}

/// Implicit start condition: every declared dependency is RUNNING
#[derive(Debug, Default, Clone, Copy)]
pub struct DependenciesRunning;

impl ServiceCondition for DependenciesRunning {
    fn description(&self) -> String {
        "all dependencies are running".to_string()
    }

    fn evaluate(&self, context: &ServiceContext<'_>) -> Result<ConditionOutcome, BoxError> {
        let waiting: Vec<String> = context
            .kernel()
            .get_my_dependencies(context.name())
            .into_iter()
            .filter(|dependency| {
                !context
                    .kernel()
                    .get_service_state(dependency)
                    .is_ok_and(|state| state.is_running())
            })
            .map(|dependency| dependency.to_string())
            .collect();

        if waiting.is_empty() {
            Ok(ConditionOutcome::Satisfied)
        } else {
            Ok(ConditionOutcome::Unsatisfied(format!(
                "dependencies not running: {}",
                waiting.join(", ")
            )))
        }
    }
}

/// Implicit stop condition: no service depending on this one is STARTING
/// or RUNNING.
///
/// A STARTING dependent may already have seen this service running, so stopping
/// underneath it would let it reach RUNNING without its dependency.
#[derive(Debug, Default, Clone, Copy)]
pub struct DependentsStopped;

impl ServiceCondition for DependentsStopped {
    fn description(&self) -> String {
        "no dependent is started".to_string()
    }

    fn evaluate(&self, context: &ServiceContext<'_>) -> Result<ConditionOutcome, BoxError> {
        let started: Vec<String> = context
            .kernel()
            .get_dependencies_on_me(context.name())
            .into_iter()
            .filter(|dependent| {
                context
                    .kernel()
                    .get_service_state(dependent)
                    .is_ok_and(|state| state.is_started())
            })
            .map(|dependent| dependent.to_string())
            .collect();

        if started.is_empty() {
            Ok(ConditionOutcome::Satisfied)
        } else {
            Ok(ConditionOutcome::Unsatisfied(format!(
                "dependents still started: {}",
                started.join(", ")
            )))
        }
    }
}

type ConditionFn = dyn Fn(&ServiceContext<'_>) -> Result<ConditionOutcome, BoxError> + Send + Sync;

/// Condition backed by a closure
#[derive(Clone)]
pub struct FnCondition {
    description: String,
    check: Arc<ConditionFn>,
}

impl FnCondition {
    pub fn new<F>(description: impl Into<String>, check: F) -> Self
    where
        F: Fn(&ServiceContext<'_>) -> Result<ConditionOutcome, BoxError> + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            check: Arc::new(check),
        }
    }
}

impl fmt::Debug for FnCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCondition")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl ServiceCondition for FnCondition {
    fn description(&self) -> String {
        self.description.clone()
    }

    fn evaluate(&self, context: &ServiceContext<'_>) -> Result<ConditionOutcome, BoxError> {
        (self.check)(context)
    }
}

/// Poll every condition once and collect the reasons of those unsatisfied
pub(crate) fn unsatisfied(conditions: &[Arc<dyn ServiceCondition>], context: &ServiceContext<'_>) -> Vec<String> {
    conditions
        .iter()
        .filter_map(|condition| match condition.evaluate(context) {
            Ok(ConditionOutcome::Satisfied) => None,
            Ok(ConditionOutcome::Unsatisfied(reason)) => Some(reason),
            Err(e) => {
                log::warn!(
                    "Condition '{}' of '{}' failed to evaluate: {}",
                    condition.description(),
                    context.name(),
                    e
                );
                Some(format!("{}: {}", condition.description(), e))
            }
        })
        .collect()
}
