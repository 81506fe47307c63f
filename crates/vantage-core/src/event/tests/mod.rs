// Event system test module
#[cfg(test)]
mod dispatcher_tests;
