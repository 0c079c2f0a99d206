pub mod emulate;
pub mod ports;
pub mod run;
pub mod scene;
pub mod scenes;
pub mod story;
pub mod turn;
