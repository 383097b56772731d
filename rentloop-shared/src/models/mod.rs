/// Database models
///
/// - `user`: accounts
/// - `category`: item categories
/// - `item`: catalog items
/// - `rental`: bookings and their status lifecycle
/// - `payment`: processor payment intents

pub mod category;
pub mod item;
pub mod payment;
pub mod rental;
pub mod user;
