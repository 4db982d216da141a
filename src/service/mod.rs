//! Service layer: session administration on top of the fan-out core.

pub mod session_service;

pub use session_service::SessionService;
