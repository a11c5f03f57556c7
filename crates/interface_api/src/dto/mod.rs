//! Request and response bodies

pub mod recharge;
pub mod installments;
pub mod wallet;
pub mod sandbox;
