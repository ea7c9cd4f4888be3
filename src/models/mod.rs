// Domain records and request/response types

pub mod attendance;
pub mod chat;
pub mod nutrition;
pub mod payment;
pub mod sleep_log;
pub mod subscription;
pub mod trainer;
pub mod user;
pub mod validation;
pub mod workout;

pub use attendance::*;
pub use chat::*;
pub use nutrition::*;
pub use payment::*;
pub use sleep_log::*;
pub use subscription::*;
pub use trainer::*;
pub use user::*;
pub use validation::*;
pub use workout::*;
