//! Board module for pinboard.
//!
//! This module provides the shared board domain:
//! - Boards with an owner and members
//! - Lists ordered within a board, cards ordered within a list
//! - Position allocation and the transactional move
//! - Services that check access, keep the snapshot cache coherent and
//!   notify subscribers

mod card_repository;
mod card_service;
mod list_repository;
mod list_service;
mod ordering;
pub mod position;
mod repository;
mod service;
mod types;

pub use card_repository::CardRepository;
pub use card_service::CardService;
pub use list_repository::ListRepository;
pub use list_service::ListService;
pub use position::{
    append_position, check_target, MoveOutcome, MovePlan, Placement, MAX_POSITION, START_POSITION,
};
pub use repository::BoardRepository;
pub use service::{BoardContext, BoardService};
pub use types::{
    Board, Card, CardUpdate, List, MoveRequest, MovedItem, NewBoard, NewCard, NewList,
    MAX_DESCRIPTION_LENGTH, MAX_TITLE_LENGTH,
};
