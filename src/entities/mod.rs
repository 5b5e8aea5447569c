pub mod prelude;

pub mod booking_approvals;
pub mod bookings;
pub mod locations;
pub mod maintenance;
pub mod users;
pub mod vehicle_types;
pub mod vehicles;
