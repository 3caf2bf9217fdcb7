pub mod ports;
pub mod session_store;
pub mod state;
