//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod file_config_adapter;
pub mod json_model_adapter;
pub mod json_report_adapter;
pub mod paper_broker;
#[cfg(feature = "web")]
pub mod web;
