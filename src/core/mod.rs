pub mod auth;
pub mod cluster;
pub mod filter;
pub mod reviews;
pub mod session;
pub mod viewport;

pub use crate::domain::model::{HouseListing, Review};
pub use crate::domain::ports::{IdentityProvider, ListingSource, ReviewGateway};
pub use crate::utils::error::Result;
