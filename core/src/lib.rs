//! # TINY-DI CORE LIBRARY
//!
//! **CALL-TIME DEPENDENCY RESOLUTION**
//!
//! **ARCHITECTURE**: Providers declare parameters; a per-call scope caches
//! resolved values, detects cycles and finalizes acquired resources in reverse
//! order.
//! **GUARANTEE**: Every acquired resource is finalized exactly once, on
//! success, failure, timeout or cancellation.
//!
//! ```rust
//! use tiny_di::api::*;
//!
//! # async fn demo() -> Result<(), DiError> {
//! let get_db = Provider::builder("get_db").call_sync(|_| Ok("db".to_string()));
//! let get_user = Provider::builder("get_user")
//!     .param(Parameter::new("db").depends(&get_db))
//!     .call_sync(|args| Ok(format!("User from {}", args.get::<String>("db")?)));
//!
//! let user = Context::empty().call_as::<String>(&get_user, Values::new()).await?;
//! assert_eq!(user.as_str(), "User from db");
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod dependencies;
pub mod errors;
pub mod types;

// **VALIDATION MODULE REGISTRATION**
pub mod validation;
