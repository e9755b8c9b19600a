#[cfg(test)]
mod bridge_tests;
