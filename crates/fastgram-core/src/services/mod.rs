//! Typed wrappers over FastGram endpoints that go through `ApiClient`.

pub mod users;

pub use users::UsersService;
