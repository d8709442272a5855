mod health;

pub use health::routes;
