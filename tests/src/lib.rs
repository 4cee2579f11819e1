//! Integration tests.

#[cfg(test)]
pub mod persistence;
pub mod shared;
#[cfg(test)]
pub mod thermal;
