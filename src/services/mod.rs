pub mod activities;
pub mod admin;
pub mod auth;
pub mod books;
pub mod genres;
pub mod recommendations;
pub mod reviews;
pub mod shelves;
