//! User events: the record type, IP denylist validation, handlers and the CSV loader
//! used by the producer API.

pub mod csv;
pub mod denylist;
pub mod handler;
pub mod user;

pub use csv::{CsvError, parse_users, read_users};
pub use denylist::{DEFAULT_DENYLIST, IpDenylist, RestrictedIp};
pub use handler::{DeadLetteredUser, UserDeadLetterHandler, UserEventHandler};
pub use user::User;
