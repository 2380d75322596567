mod auth;
mod handlers;
