pub mod scan;
pub mod sessions;
