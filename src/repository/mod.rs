pub mod ledger;
pub mod table_service;
