pub mod deposit_config;
