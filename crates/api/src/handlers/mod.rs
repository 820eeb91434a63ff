pub mod capture;
pub mod license;
