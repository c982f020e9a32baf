//! Built-in directives, registered into every [`Registry::with_builtins`].

use std::rc::Rc;

use crate::registry::{Directive, Registry};

mod conditional;
mod show;

pub use conditional::{Condition, Conditional};
pub use show::{DISPLAY_PROPERTY, Show};

pub(crate) fn register_builtins(registry: &mut Registry) {
    registry.register_directive("if", Directive::Structural(Rc::new(Conditional)));
    registry.register_directive("show", Directive::Attribute(Rc::new(Show)));
}
