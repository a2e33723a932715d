pub mod compare;
pub mod divergence;
pub mod health;
pub mod topics;
