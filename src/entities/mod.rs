pub mod booking;
pub mod booking_addon;
pub mod lot;
pub mod lot_pricing;
pub mod payment;
pub mod service_offering;
pub mod spot_hold;
pub mod user;
pub mod vehicle_type;

pub use booking::BookingStatus;
pub use booking_addon::AddonStatus;
pub use payment::PaymentStatus;
pub use user::UserRole;
pub use vehicle_type::VehicleType;
