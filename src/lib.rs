//! pinboard - collaborative board backend
//!
//! Boards hold ordered lists, lists hold ordered cards. Every committed
//! change is pushed to the clients following the board, and full-board
//! reads are served through a snapshot cache.

pub mod board;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod hub;
pub mod logging;
pub mod web;

pub use board::{
    Board, BoardContext, BoardService, Card, CardService, CardUpdate, List, ListService,
    MoveRequest, MovedItem, NewBoard, NewCard, NewList,
};
pub use cache::{Cache, CacheCoordinator, DisabledCache, MemoryCache};
pub use config::Config;
pub use db::{Database, NewUser, User, UserRepository};
pub use error::{PinboardError, Result};
pub use hub::{admit, AdmittedConnection, BoardEvent, EventKind, Hub, Principal};
pub use web::WebServer;
