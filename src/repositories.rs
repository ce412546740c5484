pub mod receipts;
pub mod sessions;
pub mod users;
