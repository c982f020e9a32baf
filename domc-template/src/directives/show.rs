use domc_core::Value;
use domc_dom::{Document, NodeId};

use crate::registry::AttributeDirective;

/// `v-show`: hides the element with `display: none` while its value is
/// falsy. The element stays in the tree either way.
#[derive(Debug, Clone, Copy, Default)]
pub struct Show;

pub const DISPLAY_PROPERTY: &str = "style.display";

impl AttributeDirective for Show {
    fn apply(&self, doc: &Document, node: NodeId, value: &Value) {
        let display = if value.is_truthy() { "" } else { "none" };
        doc.set_property(node, DISPLAY_PROPERTY, Value::from(display));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggles_display() {
        let doc = Document::new();
        let el = doc.create_element("p");
        Show.apply(&doc, el, &Value::from(false));
        assert_eq!(doc.property(el, DISPLAY_PROPERTY), Value::from("none"));
        Show.apply(&doc, el, &Value::from("yes"));
        assert_eq!(doc.property(el, DISPLAY_PROPERTY), Value::from(""));
    }
}
