//! Conversion routing: which sequence of formats takes a file from its
//! current format to its target.

mod assign;
mod resolver;
mod table;

pub use assign::{assign_routes, route_keys};
pub use resolver::{build_routes, RouteResolver, DEFAULT_MAX_ROUTE_HOPS};
pub use table::{RouteEntry, RouteTable};
