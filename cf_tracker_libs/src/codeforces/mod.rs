pub mod client;
pub mod model;
pub mod pacer;

pub use client::{CodeforcesApi, HttpTransport, RateLimitedClient, Transport, TransportResponse, UpstreamError};
