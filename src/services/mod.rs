pub mod directory;
pub use directory::{Directory, DirectoryUser, SeaOrmDirectory};

pub mod approval_chain;
pub use approval_chain::{ApprovalChainBuilder, ChainAssignment};

pub mod booking_workflow;
pub use booking_workflow::{
    BookingAggregate, BookingChanges, BookingWorkflow, CreateBooking, WorkflowError,
};

pub mod booking_workflow_impl;
pub use booking_workflow_impl::SeaOrmBookingWorkflow;

pub mod availability;
pub use availability::AvailabilityService;

pub mod maintenance_service;
pub use maintenance_service::MaintenanceService;
