//! Expression conversion in both directions.
//!
//! Outbound calls run through an ordered chain of [`CallConverter`]s; the
//! first converter that accepts a call produces its interchange form. Inbound
//! conversion is a direct recursive walk.

mod from_substrait;
mod to_substrait;

pub use from_substrait::{from_proto_expr, value_arguments};
pub use to_substrait::{
    default_call_converters, to_proto_expr, CallConverter, IfThenConverter,
    ScalarFunctionConverter, IF_FUNCTION,
};
