//! Page objects over a [`BrowserDriver`](crate::driver::BrowserDriver)

pub mod chat;
pub mod login;

pub use chat::ChatPage;
pub use login::LoginPage;
