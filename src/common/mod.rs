pub mod response;
pub mod shutdown;
pub mod telemetry;
