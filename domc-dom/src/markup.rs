use crate::{Arena, NodeId, NodeKind};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

pub(crate) fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

pub(crate) fn write_node(arena: &Arena, id: NodeId, out: &mut String) {
    let Some(data) = arena.node(id) else {
        return;
    };
    match &data.kind {
        NodeKind::Text(t) => escape_into(t, false, out),
        NodeKind::Comment(c) => {
            out.push_str("<!--");
            out.push_str(c);
            out.push_str("-->");
        }
        NodeKind::Element { tag, attrs, .. } => {
            out.push('<');
            out.push_str(tag);
            for (k, v) in attrs {
                out.push(' ');
                out.push_str(k);
                out.push_str("=\"");
                escape_into(v, true, out);
                out.push('"');
            }
            out.push('>');
            if is_void(tag) && data.children.is_empty() {
                return;
            }
            for c in &data.children {
                write_node(arena, *c, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

fn escape_into(s: &str, attr: bool, out: &mut String) {
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attr => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Document;

    #[test]
    fn serializes_nested_markup() {
        let doc = Document::new();
        let div = doc.create_element("div");
        doc.set_attribute(div, "title", "a \"b\"");
        let input = doc.create_element("input");
        let t = doc.create_text("1 < 2");
        let c = doc.create_comment("v-if");
        doc.append_child(div, input);
        doc.append_child(div, t);
        doc.append_child(div, c);
        assert_eq!(
            doc.to_markup(div),
            r#"<div title="a &quot;b&quot;"><input>1 &lt; 2<!--v-if--></div>"#
        );
    }
}
