pub mod activity_import;
pub mod insights;
