// Feedback control module

pub mod pid;

pub use pid::PidController;
