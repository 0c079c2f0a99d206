pub mod arm;
pub mod control;
pub mod events;
pub mod scenes;
pub mod state;
pub mod story;
pub mod turn;
