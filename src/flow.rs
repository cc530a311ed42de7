pub mod runner;
pub mod session;
pub mod state;
