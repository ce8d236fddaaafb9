use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::context::Context;
use crate::{config::DEFAULT_PROCEDURE_TIMEOUT, error::AppError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcedureKind {
    Query,
    Mutation,
}

impl fmt::Display for ProcedureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcedureKind::Query => f.write_str("query"),
            ProcedureKind::Mutation => f.write_str("mutation"),
        }
    }
}

/// A named server operation callable in-process or over HTTP.
#[async_trait]
pub trait Procedure: Send + Sync {
    fn name(&self) -> &'static str;

    fn kind(&self) -> ProcedureKind {
        ProcedureKind::Query
    }

    async fn call(&self, ctx: &Context, input: Value) -> Result<Value, AppError>;
}

/// Set of callable procedures, looked up by name.
pub struct Registry {
    procedures: HashMap<&'static str, Arc<dyn Procedure>>,
    timeout: Duration,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            procedures: HashMap::new(),
            timeout: DEFAULT_PROCEDURE_TIMEOUT,
        }
    }

    pub fn get(&self, name: &str) -> Result<&Arc<dyn Procedure>, AppError> {
        self.procedures
            .get(name)
            .ok_or_else(|| AppError::ProcedureNotFound(name.to_string()))
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.procedures.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Looks up and runs a procedure, bounded by the registry timeout.
    #[instrument(skip(self, ctx, input), fields(caller = %ctx.caller_id))]
    pub async fn invoke(&self, ctx: &Context, name: &str, input: Value) -> Result<Value, AppError> {
        let procedure = self.get(name)?;
        match tokio::time::timeout(self.timeout, procedure.call(ctx, input)).await {
            Ok(Ok(value)) => {
                debug!("procedure succeeded");
                Ok(value)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "procedure failed");
                Err(e)
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "procedure timed out");
                Err(AppError::Timeout(name.to_string(), self.timeout))
            }
        }
    }
}

pub struct RegistryBuilder {
    procedures: HashMap<&'static str, Arc<dyn Procedure>>,
    timeout: Duration,
}

impl RegistryBuilder {
    pub fn procedure(mut self, procedure: impl Procedure + 'static) -> Self {
        self.procedures.insert(procedure.name(), Arc::new(procedure));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Registry {
        Registry {
            procedures: self.procedures,
            timeout: self.timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Procedure for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn call(&self, ctx: &Context, input: Value) -> Result<Value, AppError> {
            Ok(json!({ "caller": ctx.caller_id, "input": input }))
        }
    }

    struct Slow;

    #[async_trait]
    impl Procedure for Slow {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn kind(&self) -> ProcedureKind {
            ProcedureKind::Mutation
        }

        async fn call(&self, _ctx: &Context, _input: Value) -> Result<Value, AppError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Value::Null)
        }
    }

    #[test]
    fn empty_registry_has_no_procedures() {
        let registry = Registry::builder().build();
        assert!(registry.names().is_empty());
    }

    #[test]
    fn registers_multiple_procedures() {
        let registry = Registry::builder().procedure(Echo).procedure(Slow).build();
        assert_eq!(registry.names(), vec!["echo", "slow"]);
        assert_eq!(registry.get("slow").unwrap().kind(), ProcedureKind::Mutation);
    }

    #[tokio::test]
    async fn invoke_passes_context_and_input() {
        let registry = Registry::builder().procedure(Echo).build();
        let out = registry
            .invoke(&Context::anonymous("test-user"), "echo", json!(1))
            .await
            .unwrap();
        assert_eq!(out, json!({ "caller": "test-user", "input": 1 }));
    }

    #[tokio::test]
    async fn unknown_procedure_is_not_found() {
        let registry = Registry::builder().build();
        let err = registry
            .invoke(&Context::anonymous("x"), "missing", Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ProcedureNotFound(name) if name == "missing"));
    }

    #[tokio::test]
    async fn invocation_times_out() {
        let registry = Registry::builder()
            .procedure(Slow)
            .timeout(Duration::from_millis(10))
            .build();
        let err = registry
            .invoke(&Context::anonymous("x"), "slow", Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Timeout(..)));
    }
}
