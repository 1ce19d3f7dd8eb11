pub mod checkin;
pub mod error;
pub mod geo;
pub mod review;
pub mod session;
