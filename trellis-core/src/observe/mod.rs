//! Observable Values
//!
//! The data layer watchers read from. [`Object`] and [`Array`] attach a
//! [`Dep`](crate::reactive::Dep) to every slot so that plain reads and
//! writes turn into subscriptions and notifications.
//!
//! Also home to the two helpers watchers use on values: [`traverse`] for
//! deep watching and [`parse_path`] for path expressions.

mod array;
mod object;
mod path;
mod traverse;
mod value;

pub use array::Array;
pub use object::Object;
pub use path::{parse_path, resolve};
pub use traverse::traverse;
pub use value::Value;
