pub mod models;
pub mod error;
pub mod services;
pub mod state;
pub mod handlers;
pub mod router;

pub use models::*;
pub use error::*;
pub use state::RegistrationServices;
pub use router::registration_routes;
