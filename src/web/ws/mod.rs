//! WebSocket endpoints.

mod board;

pub use board::board_ws_handler;
