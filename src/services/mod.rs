pub mod entries;
pub mod goals;
pub mod users;
