//! Bearer-token models: the redacted access token, decoded JWT claims, and the token holder.

pub mod claims;
pub mod holder;
pub mod token;

pub use claims::*;
pub use holder::*;
pub use token::*;
