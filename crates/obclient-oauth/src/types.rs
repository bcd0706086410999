mod client;
mod configuration;
mod consent;
mod request;
mod token;

pub use self::client::*;
pub use self::configuration::*;
pub use self::consent::*;
pub use self::request::*;
pub use self::token::*;
