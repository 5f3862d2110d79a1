pub mod bus;
pub mod pass;
pub mod pass_usage;
pub mod trip;
pub mod wallet;
pub mod wallet_transaction;
