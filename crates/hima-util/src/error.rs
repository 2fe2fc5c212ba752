//! Error types for hima

use thiserror::Error;

use crate::{GroupId, InviteCode};

/// Core error type for hima operations
#[derive(Debug, Error)]
pub enum HimaError {
    #[error("Group not found: {0}")]
    GroupNotFound(GroupId),

    #[error("No group with invite code {0}")]
    InviteCodeNotFound(InviteCode),

    #[error("Already a member of group {0}")]
    AlreadyMember(GroupId),

    #[error("No local user registered")]
    NoUser,

    #[error("Unknown status option: {0}")]
    UnknownStatusOption(String),

    #[error("Unknown tomorrow plan: {0}")]
    UnknownPlan(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Gateway error: {0}")]
    GatewayError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HimaError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreError(msg.into())
    }

    pub fn gateway(msg: impl Into<String>) -> Self {
        Self::GatewayError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, HimaError>;
