use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::Value;

use super::{
    context::Context,
    router::{Procedure, Registry},
};
use crate::{cache::is_empty_input, db::UserStore, error::AppError};

pub const GET_USERS: &str = "getUsers";

/// Lists every user in the store's default order.
pub struct GetUsers {
    store: Arc<dyn UserStore>,
}

impl GetUsers {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Procedure for GetUsers {
    fn name(&self) -> &'static str {
        GET_USERS
    }

    async fn call(&self, _ctx: &Context, input: Value) -> Result<Value, AppError> {
        if !is_empty_input(&input) {
            return Err(AppError::Validation(format!("{GET_USERS} takes no input")));
        }
        let users = self.store.list_users().await?;
        serde_json::to_value(users).map_err(|e| AppError::Internal(e.to_string()))
    }
}

/// The application's procedure set.
pub fn app_router(store: Arc<dyn UserStore>, timeout: Duration) -> Registry {
    Registry::builder()
        .procedure(GetUsers::new(store))
        .timeout(timeout)
        .build()
}
