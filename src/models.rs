pub mod analytics;
pub mod plans;
pub mod receipts;
pub mod sessions;
pub mod users;
pub mod whatsapp;
