use domc_template::{Node, ParseError, parse_fragment, parse_template};

#[test]
fn parse_element_with_text() {
    let root = parse_template("<div>hi</div>").unwrap();
    match &root {
        Node::Element { tag, children, .. } => {
            assert_eq!(tag, "div");
            assert_eq!(children, &[Node::text("hi")]);
        }
        _ => panic!("expected element"),
    }
}

#[test]
fn expression_spans_stay_verbatim() {
    let root = parse_template(r#"<p title="${a > b ? 'x' : 'y'}">Hello {{ n < 3 }} ${name}</p>"#)
        .unwrap();
    assert_eq!(root.attr("title"), Some("${a > b ? 'x' : 'y'}"));
    match &root {
        Node::Element { children, .. } => {
            assert_eq!(children, &[Node::text("Hello {{ n < 3 }} ${name}")]);
        }
        _ => panic!("expected element"),
    }
}

#[test]
fn parse_attribute_forms() {
    let root = parse_template(
        r#"<input type=text value=${x ? 1 : 2} disabled data-q='a "b"' onclick="${go(1)}"/>"#,
    )
    .unwrap();
    assert_eq!(root.tag(), Some("input"));
    assert_eq!(root.attr("type"), Some("text"));
    assert_eq!(root.attr("value"), Some("${x ? 1 : 2}"));
    assert_eq!(root.attr("disabled"), Some(""));
    assert_eq!(root.attr("data-q"), Some(r#"a "b""#));
    assert_eq!(root.attr("onclick"), Some("${go(1)}"));
}

#[test]
fn void_and_self_closing_elements() {
    let root = parse_template("<p>a<br>b<img src=x><x-icon/>c</p>").unwrap();
    let Node::Element { children, .. } = &root else {
        panic!("expected element");
    };
    let tags: Vec<_> = children.iter().map(|c| c.tag().unwrap_or("#text")).collect();
    assert_eq!(tags, ["#text", "br", "#text", "img", "x-icon", "#text"]);
}

#[test]
fn comments_and_declarations() {
    let nodes = parse_fragment("<!doctype html><!-- lead --><p>x</p>").unwrap();
    assert_eq!(nodes[0], Node::Comment(" lead ".into()));
    assert_eq!(nodes[1].tag(), Some("p"));

    // surrounding whitespace and comments are not roots
    let root = parse_template("\n  <!-- c -->\n<main></main>\n").unwrap();
    assert_eq!(root.tag(), Some("main"));
}

#[test]
fn entities_are_decoded() {
    let root = parse_template(r#"<p title="a &amp; b">&lt;ok&gt;</p>"#).unwrap();
    assert_eq!(root.attr("title"), Some("a & b"));
    let Node::Element { children, .. } = &root else {
        panic!("expected element");
    };
    assert_eq!(children, &[Node::text("<ok>")]);
}

#[test]
fn markup_errors() {
    assert_eq!(parse_template("  "), Err(ParseError::Empty));
    assert_eq!(
        parse_template("<div><p></div>"),
        Err(ParseError::MismatchedTag {
            expected: "p".into(),
            found: "div".into(),
            offset: 8,
        })
    );
    assert_eq!(
        parse_template("<div>"),
        Err(ParseError::UnclosedTag {
            tag: "div".into(),
            offset: 0,
        })
    );
    assert!(matches!(
        parse_template("</p>"),
        Err(ParseError::UnexpectedClosingTag { .. })
    ));
    assert!(matches!(
        parse_template(r#"<p title="x>y</p>"#),
        Err(ParseError::Unterminated { what: "attribute value", .. })
    ));
    assert!(matches!(
        parse_template("<div><!-- open"),
        Err(ParseError::Unterminated { what: "comment", .. })
    ));
    assert_eq!(
        parse_template("<a></a><b></b>"),
        Err(ParseError::RootCount { count: 2 })
    );
}
