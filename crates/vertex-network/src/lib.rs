//! The gateway push layer (§4.11) and HTTP surface (§6) for the Vertex trading platform.

pub mod error;
pub mod gateway;
pub mod http;
pub mod protocol;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
