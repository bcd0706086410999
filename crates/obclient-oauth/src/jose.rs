pub mod jws;
pub mod jwt;
pub mod signing;

pub use self::jws::Header;
pub use self::jwt::{Audience, Claims, RegisteredClaims};
pub use self::signing::create_signed_jwt;
