//! Internal building blocks (object model and store contract) behind the public APIs.

pub mod object;
