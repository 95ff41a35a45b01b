//! Account models and request payloads

pub mod profile;
pub mod role;
pub mod user;

pub use profile::{UpdateProfile, UserProfile};
pub use role::{AssignRole, NewRole, Role, UpdateRole, UserRole};
pub use user::{LoginRequest, NewUser, RefreshRequest, RegisterRequest, UpdateUser, User, UserView};
