pub mod admin;
pub mod create;
pub mod init;
pub mod list;
pub mod session;
pub mod violation;
