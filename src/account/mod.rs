//! Account signup and API-key bookkeeping.

pub mod handlers;
mod service;

pub use service::AccountService;
