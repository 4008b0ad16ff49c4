pub mod announcements;
pub mod auth;
pub mod dashboard;
pub mod employees;
pub mod error;
pub mod invoice;
pub mod middleware;
pub mod sales;
