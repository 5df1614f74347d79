pub mod api;
pub mod checkout;
pub mod cli;
pub mod config;
pub mod session;
