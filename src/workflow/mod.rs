pub mod conversation;
pub mod detail;
pub mod export;
pub mod identity;
pub mod mentions;
pub mod ticket_set;
