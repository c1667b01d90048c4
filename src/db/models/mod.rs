pub mod user;

pub use user::{toy_password_hash, User};
