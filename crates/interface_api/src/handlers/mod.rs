//! Request handlers

pub mod health;
pub mod recharge;
pub mod installments;
pub mod wallet;
pub mod sandbox;
