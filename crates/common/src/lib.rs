// gaia-common: shared types and pure ingestion logic for the Gaia workspace

pub mod location;
pub mod normalize;
pub mod protocol;
pub mod request;
pub mod salvage;
pub mod types;
