pub mod cookies;

pub use cookies::{is_removal, merged_cookie_header, request_cookies, SessionCookieCodec};
