pub mod matcher;
pub mod persistence;
pub mod scorer;
