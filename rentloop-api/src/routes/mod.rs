/// API route handlers
///
/// Handlers are organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Signup, tokens, password reset
/// - `categories`: Category list and creation
/// - `items`: Catalog items
/// - `rentals`: Booking and returns
/// - `payments`: Payment intents
/// - `webhooks`: Processor event ingestion
/// - `uploads`: Image uploads

pub mod auth;
pub mod categories;
pub mod health;
pub mod items;
pub mod payments;
pub mod rentals;
pub mod uploads;
pub mod webhooks;
