//! XML-RPC module
//!
//! Value model, wire codec and HTTP transport for Odoo's XML-RPC services

pub mod codec;
pub mod error;
pub mod transport;
pub mod value;

pub use codec::{decode_response, encode_call, encode_fault, encode_response};
pub use error::{Fault, XmlRpcError};
pub use transport::{HttpTransport, Service, Transport};
pub use value::Value;
