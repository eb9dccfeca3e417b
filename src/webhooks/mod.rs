//! Payment-processor webhook adapters.
//!
//! Each adapter verifies the processor's signature over the raw body, then
//! translates events into storage calls. Domain-side no-ops (unknown event
//! types, missing users, unmapped prices) still answer 200 so processors do
//! not retry deliveries that worked.

pub mod gumroad;
pub mod paddle;
pub mod signature;
