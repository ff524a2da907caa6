pub mod batch;
pub mod combinations;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod reports;
pub mod routes;

pub use routes::create_router;
