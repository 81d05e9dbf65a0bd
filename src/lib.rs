//! PRISMA telemetry service library.

pub mod apm;
pub mod config;
pub mod correlation;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod portfolio;

pub use apm::Apm;
pub use config::schema::PrismaConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
