// Kernel test modules
pub(crate) mod common;

#[cfg(test)]
mod shutdown_tests;
