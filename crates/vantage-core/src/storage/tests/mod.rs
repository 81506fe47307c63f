#![cfg(test)]

mod config_tests;
mod format_tests;
