//! Runnable interface and registry.
//!
//! §9 replaces dynamic-dispatch-by-name module loading with a registry mapping module names
//! to factories, populated at startup. An unknown module name fails a job's COMPILATION phase
//! as a data error rather than crashing the worker.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::server::error::worker::WorkerError;
use crate::server::error::Error;

/// Output of a single dataflow emission: the parameter set(s) to flow, and the branch code
/// they flow on.
pub struct DataflowEvent {
    /// One or more parameter mappings to flow on this branch.
    pub params: Vec<Value>,
    /// The branch code this event flows on.
    pub branch_code: String,
}

/// Callback handed to a runnable so it can emit dataflow events during `run()` or
/// `write_output()`.
pub trait DataflowSink {
    /// Records a dataflow event to be applied once the job reaches WRITE_OUTPUT.
    fn dataflow_output_id(&mut self, params: Value, branch_code: &str);
}

/// Accumulates dataflow events emitted by a runnable during one job's execution.
#[derive(Default)]
pub struct RecordingDataflowSink {
    events: Vec<DataflowEvent>,
}

impl RecordingDataflowSink {
    /// Consumes the sink, returning every recorded event grouped by branch code in emission
    /// order.
    pub fn into_events(self) -> Vec<DataflowEvent> {
        self.events
    }
}

impl DataflowSink for RecordingDataflowSink {
    fn dataflow_output_id(&mut self, params: Value, branch_code: &str) {
        if let Some(last) = self.events.last_mut() {
            if last.branch_code == branch_code {
                last.params.push(params);
                return;
            }
        }

        self.events.push(DataflowEvent {
            params: vec![params],
            branch_code: branch_code.to_string(),
        });
    }
}

/// The interface a user-provided analysis module implements.
///
/// Each phase is optional; a runnable that doesn't override a phase is a no-op for it, which
/// matches the behavior of modules that only implement `run()`.
pub trait Runnable: Send + Sync {
    /// Compile-time constants merged under the analysis's configured parameters, lowest
    /// priority in the parameter resolution chain.
    fn param_defaults(&self) -> Value {
        Value::Object(Default::default())
    }

    /// Resolves and validates input parameters. Receives the merged parameter set (analysis
    /// defaults, job input, `param_defaults()`) and may mutate it in place (e.g. expanding an
    /// `_ext_input_analysis_data_id` indirection already performed by the worker).
    fn fetch_input(&self, _params: &mut Value) -> Result<(), Error> {
        Ok(())
    }

    /// Executes the analysis's work. May emit dataflow events through `sink`.
    fn run(&self, _params: &Value, _sink: &mut dyn DataflowSink) -> Result<(), Error> {
        Ok(())
    }

    /// Emits any dataflow events that depend on the outcome of `run()` rather than the input
    /// parameters alone.
    fn write_output(&self, _params: &Value, _sink: &mut dyn DataflowSink) -> Result<(), Error> {
        Ok(())
    }
}

/// A factory constructing a fresh [`Runnable`] instance per job.
pub type RunnableFactory = Arc<dyn Fn() -> Box<dyn Runnable> + Send + Sync>;

/// Maps analysis `module_name` to the factory that builds its runnable.
#[derive(Clone, Default)]
pub struct RunnableRegistry {
    factories: HashMap<String, RunnableFactory>,
}

impl RunnableRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under `module_name`, overwriting any previous registration.
    pub fn register<F>(&mut self, module_name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Runnable> + Send + Sync + 'static,
    {
        self.factories.insert(module_name.into(), Arc::new(factory));
    }

    /// Instantiates the runnable registered for `module_name`.
    ///
    /// # Errors
    /// Returns [`WorkerError::UnknownRunnable`] if no factory is registered under that name.
    pub fn build(&self, module_name: &str) -> Result<Box<dyn Runnable>, Error> {
        let factory = self
            .factories
            .get(module_name)
            .ok_or_else(|| WorkerError::UnknownRunnable(module_name.to_string()))?;

        Ok(factory())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopRunnable;
    impl Runnable for NoopRunnable {}

    #[test]
    fn builds_registered_runnable() {
        let mut registry = RunnableRegistry::new();
        registry.register("NoopRunnable", || Box::new(NoopRunnable));

        assert!(registry.build("NoopRunnable").is_ok());
    }

    #[test]
    fn rejects_unknown_module() {
        let registry = RunnableRegistry::new();
        let err = registry.build("DoesNotExist").unwrap_err();
        assert!(matches!(err, Error::WorkerError(WorkerError::UnknownRunnable(_))));
    }

    #[test]
    fn groups_events_emitted_on_same_branch() {
        let mut sink = RecordingDataflowSink::default();
        sink.dataflow_output_id(Value::from(1), "1");
        sink.dataflow_output_id(Value::from(2), "1");
        sink.dataflow_output_id(Value::from(3), "2");

        let events = sink.into_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].branch_code, "1");
        assert_eq!(events[0].params.len(), 2);
        assert_eq!(events[1].branch_code, "2");
        assert_eq!(events[1].params.len(), 1);
    }
}
