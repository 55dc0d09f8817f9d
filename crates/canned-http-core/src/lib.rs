//! canned-http core - script model, request validation and exchange sequencing
//!
//! Everything here is free of I/O: the transport hands in parsed requests and
//! gets back [`Dispatch`] instructions.

pub mod constants;
pub mod dispatcher;
pub mod error;
pub mod loader;
pub mod request;
pub mod script;
pub mod sequencer;
pub mod validator;

pub use dispatcher::{dispatch, CannedResponse, Dispatch};
pub use error::{BodySide, Error, Result};
pub use loader::{load_script, ScriptFile, ScriptFormat};
pub use request::ObservedRequest;
pub use script::*;
pub use sequencer::{ConnectionSession, ConnectionState, Director};
pub use validator::{validate, Mismatch};
