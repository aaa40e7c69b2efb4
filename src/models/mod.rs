pub mod driver;
pub mod route;
pub mod trip;
