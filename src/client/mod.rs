//! Audio client sessions
//!
//! Format negotiation and the session lifecycle over one engine connection.

pub mod cached;
pub mod engine;
pub mod negotiate;
pub mod render;
pub mod session;
pub mod simulated;
pub mod status;

#[cfg(windows)]
pub mod wasapi;

pub use cached::Cached;
pub use engine::{AudioEngine, EngineResult, FormatQuery, ShareMode, StreamFlags, RENDER_CLIENT_SERVICE};
pub use negotiate::{FormatNegotiator, FormatSupport};
pub use render::RenderTransfer;
pub use session::{create_shared_session, SessionController, SessionState, SharedSession};
pub use simulated::{SimulatedConfig, SimulatedEngine};
pub use status::HResult;
