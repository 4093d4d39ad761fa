pub mod apikey;
pub mod build_db;
pub mod cutout;
pub mod simulation;
pub mod snapshot;
