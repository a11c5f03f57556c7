//! Core Kernel - Foundational types shared by the recharge and financing domains
//!
//! This crate provides the building blocks used across all domain modules:
//! - Money types with precise decimal arithmetic and currency formatting
//! - Strongly-typed identifiers and value objects
//! - Port infrastructure for the hexagonal architecture

pub mod money;
pub mod identifiers;
pub mod phone;
pub mod error;
pub mod ports;

pub use money::{Money, Currency, MoneyError, Rate};
pub use identifiers::{
    UserId, PlanId, FinancingOptionId, RechargeId, FinancingId,
    InstallmentId, WalletTransactionId, TransactionId,
};
pub use phone::PhoneNumber;
pub use error::CoreError;
pub use ports::{PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth};
