#[cfg(test)]
mod name_tests;
