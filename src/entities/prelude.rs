pub use super::booking_approvals::Entity as BookingApprovals;
pub use super::bookings::Entity as Bookings;
pub use super::locations::Entity as Locations;
pub use super::maintenance::Entity as Maintenance;
pub use super::users::Entity as Users;
pub use super::vehicle_types::Entity as VehicleTypes;
pub use super::vehicles::Entity as Vehicles;
