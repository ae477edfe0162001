//! Payment gateway implementations

pub mod facilitator;
pub mod ledger;

pub use facilitator::FacilitatorGateway;
pub use ledger::LedgerGateway;
