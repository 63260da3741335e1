mod error;
mod sample;
mod source;

pub use error::LocationError;
pub use sample::PositionSample;
pub use source::{parse_coordinates, AgentSource, FixedSource, LocationSource, Source};
