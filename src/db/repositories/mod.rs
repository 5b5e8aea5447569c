pub mod approval;
pub mod booking;
pub mod maintenance;
pub mod user;
pub mod vehicle;
