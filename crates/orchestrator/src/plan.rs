use std::fmt;

use fairsoil_gateway::{TxReceipt, TxRequest};
use serde::Serialize;

pub const DEFAULT_SUCCESS_MESSAGE: &str = "Transaction successful!";

type DeriveFn = dyn Fn(&[TxReceipt]) -> Option<TxRequest> + Send + Sync;

pub enum PlanStep {
    Fixed(TxRequest),
    /// Built from the receipts of earlier steps. `None` skips the step.
    Derived {
        label: &'static str,
        build: Box<DeriveFn>,
    },
}

impl PlanStep {
    pub fn derived<F>(label: &'static str, build: F) -> Self
    where
        F: Fn(&[TxReceipt]) -> Option<TxRequest> + Send + Sync + 'static,
    {
        Self::Derived {
            label,
            build: Box::new(build),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Fixed(request) => request.function,
            Self::Derived { label, .. } => label,
        }
    }

    pub(crate) fn resolve(&self, receipts: &[TxReceipt]) -> Option<TxRequest> {
        match self {
            Self::Fixed(request) => Some(request.clone()),
            Self::Derived { build, .. } => build(receipts),
        }
    }
}

impl fmt::Debug for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(request) => f.debug_tuple("Fixed").field(request).finish(),
            Self::Derived { label, .. } => f.debug_struct("Derived").field("label", label).finish(),
        }
    }
}

/// An ordered sequence of writes behind one user action.
#[derive(Debug)]
pub struct ActionPlan {
    pub name: String,
    pub steps: Vec<PlanStep>,
    pub success_message: String,
}

impl ActionPlan {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            success_message: DEFAULT_SUCCESS_MESSAGE.to_string(),
        }
    }

    pub fn single(name: impl Into<String>, request: TxRequest) -> Self {
        Self::new(name).then(request)
    }

    pub fn then(mut self, request: TxRequest) -> Self {
        self.steps.push(PlanStep::Fixed(request));
        self
    }

    pub fn then_derived<F>(mut self, label: &'static str, build: F) -> Self
    where
        F: Fn(&[TxReceipt]) -> Option<TxRequest> + Send + Sync + 'static,
    {
        self.steps.push(PlanStep::derived(label, build));
        self
    }

    pub fn with_success_message(mut self, message: impl Into<String>) -> Self {
        self.success_message = message.into();
        self
    }
}

/// How far a plan got. Steps that landed before a failure are not rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum PlanProgress {
    NotStarted,
    StepDone(usize),
    Complete,
    PartialFailure { at_step: usize, completed: usize },
}

impl PlanProgress {
    pub fn landed_steps(self, total: usize) -> usize {
        match self {
            Self::NotStarted => 0,
            Self::StepDone(step) => step + 1,
            Self::Complete => total,
            Self::PartialFailure { completed, .. } => completed,
        }
    }
}
