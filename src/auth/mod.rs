pub mod cookies;
pub mod oauth2;
pub mod provider;
pub mod token;
