//! SeaORM entities.

pub mod finding;
