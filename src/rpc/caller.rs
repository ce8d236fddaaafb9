use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{context::Context, procedures::GET_USERS, router::Registry};
use crate::{db::User, error::AppError};

/// In-process procedure caller bound to one request's context.
///
/// Used while rendering on the server, where going through the HTTP bridge
/// would be a round trip to ourselves.
#[derive(Clone)]
pub struct Caller {
    registry: Arc<Registry>,
    ctx: Context,
}

impl Caller {
    pub fn new(registry: Arc<Registry>, ctx: Context) -> Self {
        Self { registry, ctx }
    }

    pub async fn call(&self, procedure: &str, input: Value) -> Result<Value, AppError> {
        self.registry.invoke(&self.ctx, procedure, input).await
    }

    pub async fn call_as<T: DeserializeOwned>(&self, procedure: &str, input: Value) -> Result<T, AppError> {
        let value = self.call(procedure, input).await?;
        serde_json::from_value(value).map_err(|e| AppError::Internal(e.to_string()))
    }

    pub async fn get_users(&self) -> Result<Vec<User>, AppError> {
        self.call_as(GET_USERS, Value::Null).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{memory::MemoryUserStore, StoreError},
        rpc::procedures::app_router,
    };
    use std::time::Duration;

    fn caller(store: Arc<MemoryUserStore>) -> Caller {
        Caller::new(
            Arc::new(app_router(store, Duration::from_secs(1))),
            Context::anonymous("test-user"),
        )
    }

    #[tokio::test]
    async fn get_users_returns_typed_rows() {
        let store = Arc::new(MemoryUserStore::with_users(1));
        let users = caller(store).get_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, 1);
        assert_eq!(users[0].name.as_deref(), Some("User 1"));
    }

    #[tokio::test]
    async fn get_users_fails_with_store_error() {
        let store = Arc::new(MemoryUserStore::new());
        store.set_failing(true);
        let err = caller(store).get_users().await.unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn unknown_procedure_is_reported() {
        let err = caller(Arc::new(MemoryUserStore::new()))
            .call("nope", Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ProcedureNotFound(_)));
    }
}
