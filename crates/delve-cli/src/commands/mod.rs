pub mod chat;
pub mod findall;
pub mod research;
pub mod search;
pub mod utils;
