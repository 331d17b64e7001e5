pub mod articles;
pub mod categories;
pub mod media;
pub mod sitemap;
pub mod tags;
pub mod users;
