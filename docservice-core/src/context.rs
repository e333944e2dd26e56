//! Per-service user context and access assertions.
//!
//! Services carry a [`ServiceContext`] holding the user the current call acts on
//! behalf of. The [`ContextCapable`] trait provides the accessors and the ACL
//! assertions on top of it. When ACL checking is disabled every assertion passes.

use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};

/// The user a service call acts on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextUser {
    pub id: i64,
    /// Right identifiers granted to the user.
    #[serde(default)]
    pub rights: Vec<String>,
}

impl ContextUser {
    pub fn new(id: i64) -> Self {
        Self { id, rights: Vec::new() }
    }

    pub fn with_right(mut self, right: impl Into<String>) -> Self {
        self.rights.push(right.into());
        self
    }

    pub fn can(&self, right: &str) -> bool {
        self.rights.iter().any(|granted| granted == right)
    }
}

/// Call context shared by the operations of one service instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceContext {
    pub user: Option<ContextUser>,
    pub acl_check: bool,
}

impl Default for ServiceContext {
    fn default() -> Self {
        Self { user: None, acl_check: true }
    }
}

impl ServiceContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: ContextUser) -> Self {
        self.user = Some(user);
        self
    }

    pub fn without_acl_check(mut self) -> Self {
        self.acl_check = false;
        self
    }
}

/// Access to a [`ServiceContext`] and the assertions built on it.
pub trait ContextCapable {
    fn context(&self) -> &ServiceContext;

    fn context_mut(&mut self) -> &mut ServiceContext;

    fn disable_acl_check(&mut self) {
        self.context_mut().acl_check = false;
    }

    fn set_context_user(&mut self, user: Option<ContextUser>) {
        self.context_mut().user = user;
    }

    fn context_user(&self) -> Option<&ContextUser> {
        self.context().user.as_ref()
    }

    fn has_context_user(&self) -> bool {
        self.context_user().is_some()
    }

    fn context_user_can(&self, right: &str) -> bool {
        self.context_user().is_some_and(|user| user.can(right))
    }

    /// Rights of the context user, empty without one.
    fn context_user_rights(&self) -> &[String] {
        self.context_user().map(|user| user.rights.as_slice()).unwrap_or_default()
    }

    /// Fails with `Unauthorized` when no user is attached.
    fn assert_has_context_user(&self, message: &str) -> ServiceResult<()> {
        if !self.context().acl_check || self.has_context_user() {
            return Ok(());
        }
        Err(ServiceError::Unauthorized(message.to_string()))
    }

    /// Fails with `Forbidden` when a user is attached.
    fn assert_no_context_user(&self, message: &str) -> ServiceResult<()> {
        if !self.context().acl_check || !self.has_context_user() {
            return Ok(());
        }
        Err(ServiceError::Forbidden(message.to_string()))
    }

    /// Fails with `Forbidden` unless the context user holds `right`.
    fn assert_context_user_can(&self, right: &str, message: &str) -> ServiceResult<()> {
        if !self.context().acl_check || self.context_user_can(right) {
            return Ok(());
        }
        Err(ServiceError::Forbidden(message.to_string()))
    }

    fn assert_user_and_can(&self, right: &str, message: &str) -> ServiceResult<()> {
        self.assert_has_context_user(message)?;
        self.assert_context_user_can(right, message)
    }
}

impl ContextCapable for ServiceContext {
    fn context(&self) -> &ServiceContext {
        self
    }

    fn context_mut(&mut self) -> &mut ServiceContext {
        self
    }
}
