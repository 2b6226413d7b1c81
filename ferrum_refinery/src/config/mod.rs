pub mod refinery_config;
