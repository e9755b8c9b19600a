#[cfg(test)]
mod deploy_tests;
