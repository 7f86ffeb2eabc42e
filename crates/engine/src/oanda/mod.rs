pub mod rest;

pub use rest::OandaClient;
