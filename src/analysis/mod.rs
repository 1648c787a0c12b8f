pub mod aggregate;
pub mod categorize;
pub mod filter;
pub mod simulate;
pub mod stats;
