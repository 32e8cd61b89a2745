//! Core domain types and logic.

pub mod action;
pub mod bar;
pub mod portfolio;
pub mod sizing;
pub mod observation;
pub mod environment;
pub mod normalization;
pub mod decision;
pub mod policy;
pub mod execution;
pub mod report;
pub mod metrics;
pub mod instruments;
pub mod backtest;
pub mod live;
pub mod config_validation;
pub mod error;
