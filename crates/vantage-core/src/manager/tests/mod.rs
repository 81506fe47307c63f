#![cfg(test)]

mod control_tests;
