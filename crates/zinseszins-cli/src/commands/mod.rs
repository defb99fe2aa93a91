pub mod analysis;
pub mod market;
pub mod plan;
pub mod tax;
