/// Payment-intent management
///
/// - [`fees`]: minor-unit arithmetic and the platform fee
/// - [`processor`]: the external processor client
/// - [`webhook`]: signed event verification and decoding
/// - [`settlement`]: applying events to payments and rentals

pub mod fees;
pub mod processor;
pub mod settlement;
pub mod webhook;
