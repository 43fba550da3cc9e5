pub mod distributed;
pub mod local;
