//! CLI subcommands

pub mod health;
pub mod round;
pub mod series;
pub mod servers;
