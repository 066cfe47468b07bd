//! # Reconf Expression
//!
//! Tokenizer and validator for trigger expressions.
//!
//! A trigger expression combines function macros such as
//! `{web1:system.cpu.load[all,avg1].avg(5m)}` with numbers, macros and
//! operators. The only part the import engine needs from it is the ordered
//! list of `(host, item key)` pairs it references, plus a way to rewrite the
//! host part when a template trigger is inherited by a host.
//!
//! ## Example
//!
//! ```rust
//! use reconf_expression::TriggerExpression;
//!
//! let expr = TriggerExpression::parse("{web1:agent.ping.nodata(5m)}=1").unwrap();
//! let items = expr.host_items();
//! assert_eq!(items[0].host, "web1");
//! assert_eq!(items[0].key, "agent.ping");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod expression;
mod parser;

pub use error::{ExpressionError, ExpressionResult};
pub use expression::{FunctionMacro, ParseOptions, TriggerExpression};
