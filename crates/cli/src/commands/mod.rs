pub mod chat;
pub mod doctor;
pub mod knowledge;
pub mod onboard;
