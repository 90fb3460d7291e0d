pub mod config;
pub mod credentials;
pub mod deploy;
pub mod metadata;
pub mod mint;
pub mod network;
pub mod pinata;
pub mod store;
