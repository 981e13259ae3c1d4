pub mod eth;
pub mod ledger;
