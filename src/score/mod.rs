pub mod actions;
pub mod attribution;
pub mod point_log;
pub mod projection;
