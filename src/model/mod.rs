pub mod favorite;
pub mod message;
pub mod mongodb;
pub mod ranking;
pub mod review;
