pub mod process;
pub mod vendors;
