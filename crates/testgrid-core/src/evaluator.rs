//! Framework result evaluators.
//!
//! Each test framework reports its results in its own shape. An evaluator
//! turns one of those raw results into a pass/fail verdict. Evaluators are
//! looked up by framework identifier in an [`EvaluatorRegistry`]; looking up
//! an identifier nobody registered is an error, never a default verdict.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::CoreError;

/// Turns a framework-specific raw result into a verdict.
pub trait ResultEvaluator: Send + Sync {
    /// Returns `Ok(true)` if the raw result represents a passing run.
    fn evaluate(&self, raw: &Value) -> Result<bool, CoreError>;
}

impl<F> ResultEvaluator for F
where
    F: Fn(&Value) -> Result<bool, CoreError> + Send + Sync,
{
    fn evaluate(&self, raw: &Value) -> Result<bool, CoreError> {
        self(raw)
    }
}

/// The frameworks the execution service understands out of the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinEvaluator {
    /// `{passed: bool}`, passes iff `passed`.
    Jasmine,
    /// `{passed: int, total: int}`, passes iff `passed == total`.
    Qunit,
    /// `{failures: int}`, passes iff `failures == 0`.
    Mocha,
    /// `{passed: int, total: int}`, passes iff `passed == total`.
    YuiTest,
    /// `{failed: int}`, passes iff `failed == 0`.
    Custom,
}

#[derive(Deserialize)]
struct JasmineResult {
    passed: bool,
}

#[derive(Deserialize)]
struct CountResult {
    passed: u64,
    total: u64,
}

#[derive(Deserialize)]
struct MochaResult {
    failures: u64,
}

#[derive(Deserialize)]
struct CustomResult {
    failed: u64,
}

impl BuiltinEvaluator {
    pub const ALL: [BuiltinEvaluator; 5] = [
        Self::Jasmine,
        Self::Qunit,
        Self::Mocha,
        Self::YuiTest,
        Self::Custom,
    ];

    /// Framework identifier as sent to the execution service.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Jasmine => "jasmine",
            Self::Qunit => "qunit",
            Self::Mocha => "mocha",
            Self::YuiTest => "YUI Test",
            Self::Custom => "custom",
        }
    }

    fn parse<T: DeserializeOwned>(&self, raw: &Value) -> Result<T, CoreError> {
        T::deserialize(raw).map_err(|e| CoreError::MalformedResult {
            framework: self.id().to_string(),
            message: e.to_string(),
        })
    }
}

impl ResultEvaluator for BuiltinEvaluator {
    fn evaluate(&self, raw: &Value) -> Result<bool, CoreError> {
        match self {
            Self::Jasmine => Ok(self.parse::<JasmineResult>(raw)?.passed),
            Self::Qunit | Self::YuiTest => {
                let counts = self.parse::<CountResult>(raw)?;
                Ok(counts.passed == counts.total)
            }
            Self::Mocha => Ok(self.parse::<MochaResult>(raw)?.failures == 0),
            Self::Custom => Ok(self.parse::<CustomResult>(raw)?.failed == 0),
        }
    }
}

impl fmt::Display for BuiltinEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Lookup table from framework identifier to evaluator.
///
/// Stateless once built; share it behind an `Arc` across jobs.
#[derive(Clone)]
pub struct EvaluatorRegistry {
    evaluators: HashMap<String, Arc<dyn ResultEvaluator>>,
}

impl EvaluatorRegistry {
    /// Create an empty registry.
    pub fn empty() -> Self {
        Self {
            evaluators: HashMap::new(),
        }
    }

    /// Create a registry holding every [`BuiltinEvaluator`].
    pub fn with_builtins() -> Self {
        BuiltinEvaluator::ALL
            .into_iter()
            .fold(Self::empty(), |registry, builtin| {
                registry.with(builtin.id(), builtin)
            })
    }

    /// Builder method to register an evaluator.
    pub fn with(
        mut self,
        framework: impl Into<String>,
        evaluator: impl ResultEvaluator + 'static,
    ) -> Self {
        self.register(framework, evaluator);
        self
    }

    /// Register (or replace) the evaluator for a framework.
    pub fn register(
        &mut self,
        framework: impl Into<String>,
        evaluator: impl ResultEvaluator + 'static,
    ) {
        self.evaluators.insert(framework.into(), Arc::new(evaluator));
    }

    /// Returns true if an evaluator is registered for the framework.
    pub fn contains(&self, framework: &str) -> bool {
        self.evaluators.contains_key(framework)
    }

    /// Registered framework identifiers, sorted.
    pub fn frameworks(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.evaluators.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Evaluate a raw result with the framework's evaluator.
    pub fn evaluate(&self, framework: &str, raw: &Value) -> Result<bool, CoreError> {
        let evaluator = self
            .evaluators
            .get(framework)
            .ok_or_else(|| CoreError::UnknownFramework(framework.to_string()))?;
        evaluator.evaluate(raw)
    }
}

impl Default for EvaluatorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for EvaluatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluatorRegistry")
            .field("frameworks", &self.frameworks())
            .finish()
    }
}
