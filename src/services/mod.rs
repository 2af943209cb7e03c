// Core booking domain
pub mod availability;
pub mod booking_lifecycle;
pub mod bookings;
pub mod pricing;
pub mod spot_holds;

// Back office
pub mod addons;
pub mod catalog;
pub mod lots;
pub mod users;

// Payments and notifications
pub mod notifications;
pub mod payments;

// External lookups
pub mod flights;
pub mod vehicles;
