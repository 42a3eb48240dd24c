pub mod error;
pub mod events;
pub mod handlers;
pub mod lyrics;
pub mod middleware;
pub mod notifications;
pub mod orders;
pub mod recovery;
pub mod routes;

pub use error::ApiError;
pub use routes::create_router;
