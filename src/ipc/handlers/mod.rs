pub mod attendance;
pub mod backup_exchange;
pub mod checkin;
pub mod classes;
pub mod core;
pub mod session;
pub mod students;
