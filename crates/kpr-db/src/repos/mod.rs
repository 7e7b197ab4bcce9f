//! Repository implementations

mod session;
mod user;
mod verification;

pub use session::{SessionRepo, STATUS_ACTIVE, STATUS_REVOKED};
pub use user::UserRepo;
pub use verification::VerificationTokenRepo;
