//! Configuration access port trait.
//!
//! Values come back as raw strings; typed parsing and range checks live in
//! `domain::config_validation` so every adapter rejects bad input the same way.

pub trait ConfigPort {
    /// `None` for a missing section, missing key or blank value.
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    /// Section names present in the source, lowercased.
    fn sections(&self) -> Vec<String>;
}
