pub mod account;
pub mod disease;
pub mod forecast;
pub mod market;
pub mod status;
