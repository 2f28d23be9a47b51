use markloom::ast::{BulletList, Link, ListItem, OrderedList, TreeNode};
use markloom::source::SourceSpan;
use markloom::{Document, NodeId, NodeValue, Parser, SourceSpanMode};
use pretty_assertions::assert_eq;

fn parse(input: &str) -> Document {
    Parser::new().parse(input)
}

fn parse_with_spans(input: &str, mode: SourceSpanMode) -> Document {
    Parser::builder().source_span_mode(mode).build().unwrap().parse(input)
}

fn children(document: &Document, node: NodeId) -> Vec<NodeId> {
    document.children(node).collect()
}

fn text(literal: &str) -> TreeNode {
    leaf(NodeValue::Text(literal.to_string()))
}

fn leaf(value: NodeValue) -> TreeNode {
    TreeNode {
        value,
        source_spans: Vec::new(),
        children: Vec::new(),
    }
}

fn node(value: NodeValue, children: Vec<TreeNode>) -> TreeNode {
    TreeNode {
        value,
        source_spans: Vec::new(),
        children,
    }
}

#[test]
fn heading_and_paragraph_tree() {
    let document = parse("# Title\n\nSome *text*\nhere");
    let expected = node(
        NodeValue::Document,
        vec![
            node(NodeValue::Heading { level: 1 }, vec![text("Title")]),
            node(
                NodeValue::Paragraph,
                vec![
                    text("Some "),
                    node(NodeValue::Emphasis { delimiter: '*' }, vec![text("text")]),
                    leaf(NodeValue::SoftLineBreak),
                    text("here"),
                ],
            ),
        ],
    );
    assert_eq!(document.to_tree(document.root()), expected);
}

#[test]
fn list_attributes() {
    let document = parse("3) one\n4) two\n\n- a\n\n- b\n");
    let lists = children(&document, document.root());
    assert_eq!(lists.len(), 2);
    assert_eq!(
        document.value(lists[0]),
        &NodeValue::OrderedList(OrderedList {
            start: 3,
            delimiter: ')',
            tight: true,
        })
    );
    assert_eq!(
        document.value(lists[1]),
        &NodeValue::BulletList(BulletList {
            marker: '-',
            tight: false,
        })
    );

    let first_item = document.first_child(lists[0]).unwrap();
    assert_eq!(
        document.value(first_item),
        &NodeValue::ListItem(ListItem {
            marker_indent: 0,
            content_indent: 3,
        })
    );
}

#[test]
fn fenced_code_block_attributes() {
    let document = parse("  ~~~~ rust extra\n  let x;\n ~~~~\n");
    let code = document.first_child(document.root()).unwrap();
    let NodeValue::FencedCodeBlock(block) = document.value(code) else {
        panic!("expected a fenced code block, got {:?}", document.value(code));
    };
    assert_eq!(block.fence_char, '~');
    assert_eq!(block.fence_length, 4);
    assert_eq!(block.fence_indent, 2);
    assert_eq!(block.info, "rust extra");
    assert_eq!(block.literal, "let x;\n");
}

#[test]
fn link_reference_definitions_stay_in_tree() {
    let document = parse("[Foo Bar]: /url 'title'\n\n[foo bar] and [missing]\n");
    let blocks = children(&document, document.root());
    assert_eq!(blocks.len(), 2);
    let NodeValue::LinkReferenceDefinition(definition) = document.value(blocks[0]) else {
        panic!("expected a definition, got {:?}", document.value(blocks[0]));
    };
    assert_eq!(definition.label, "Foo Bar");
    assert_eq!(definition.destination, "/url");
    assert_eq!(definition.title.as_deref(), Some("title"));

    let inlines = children(&document, blocks[1]);
    assert_eq!(
        document.value(inlines[0]),
        &NodeValue::Link(Link {
            destination: "/url".to_string(),
            title: Some("title".to_string()),
        })
    );
    assert_eq!(document.text_content(inlines[0]), "foo bar");
    assert_eq!(document.value(inlines[1]), &NodeValue::Text(" and [missing]".to_string()));
}

#[test]
fn paragraph_of_only_definitions_is_removed() {
    let document = parse("[a]: /a\n[b]: /b\n");
    let blocks = children(&document, document.root());
    assert_eq!(blocks.len(), 2);
    assert!(
        blocks
            .iter()
            .all(|&block| matches!(document.value(block), NodeValue::LinkReferenceDefinition(_)))
    );
}

#[test]
fn unclosed_bracket_is_literal_text() {
    let document = parse("[foo");
    let paragraph = document.first_child(document.root()).unwrap();
    assert_eq!(
        document.to_tree(paragraph),
        node(NodeValue::Paragraph, vec![text("[foo")])
    );
}

#[test]
fn adjacent_text_is_merged() {
    let document = parse("a ] b ! c [ d");
    let paragraph = document.first_child(document.root()).unwrap();
    assert_eq!(children(&document, paragraph).len(), 1);
    assert_eq!(document.text_content(paragraph), "a ] b ! c [ d");
}

#[test]
fn parsing_is_deterministic() {
    let input = "> # Quote\n> - *a* `b`\n>   [c](/d)\n\n1. <e@f.g>\n\n    code\n";
    let parser = Parser::builder()
        .source_span_mode(SourceSpanMode::BlocksAndInlines)
        .build()
        .unwrap();
    let first = parser.parse(input);
    let second = parser.parse(input);
    assert_eq!(first.to_tree(first.root()), second.to_tree(second.root()));
}

#[test]
fn block_spans() {
    let document = parse_with_spans("# Title\n\n- a\n  b\n", SourceSpanMode::Blocks);
    let blocks = children(&document, document.root());
    assert_eq!(document.source_spans(blocks[0]), &[SourceSpan::new(0, 0, 0, 7)]);
    assert_eq!(
        document.source_spans(blocks[1]),
        &[SourceSpan::new(2, 0, 9, 3), SourceSpan::new(3, 0, 13, 3)]
    );

    // Inline nodes have no spans in this mode.
    let text = document.first_child(blocks[0]).unwrap();
    assert!(document.source_spans(text).is_empty());
}

#[test]
fn atx_heading_inlines_have_no_spans_in_block_mode() {
    let document = parse_with_spans("# Title *x*\n", SourceSpanMode::Blocks);
    let heading = document.first_child(document.root()).unwrap();
    assert_eq!(document.source_spans(heading), &[SourceSpan::new(0, 0, 0, 11)]);
    for inline in document.descendants(heading).skip(1) {
        assert!(
            document.source_spans(inline).is_empty(),
            "{:?} has spans",
            document.value(inline)
        );
    }
}

#[test]
fn atx_heading_inline_spans() {
    let document = parse_with_spans("# Title *x*\n", SourceSpanMode::BlocksAndInlines);
    let heading = document.first_child(document.root()).unwrap();
    let inlines = children(&document, heading);
    assert_eq!(document.source_spans(inlines[0]), &[SourceSpan::new(0, 2, 2, 6)]);
    assert_eq!(document.source_spans(inlines[1]), &[SourceSpan::new(0, 8, 8, 3)]);
}

#[test]
fn inline_spans() {
    let document = parse_with_spans("b *c*\n", SourceSpanMode::BlocksAndInlines);
    let paragraph = document.first_child(document.root()).unwrap();
    assert_eq!(document.source_spans(paragraph), &[SourceSpan::new(0, 0, 0, 5)]);

    let inlines = children(&document, paragraph);
    assert_eq!(inlines.len(), 2);
    assert_eq!(document.source_spans(inlines[0]), &[SourceSpan::new(0, 0, 0, 2)]);
    assert_eq!(document.source_spans(inlines[1]), &[SourceSpan::new(0, 2, 2, 3)]);
    let inner = document.first_child(inlines[1]).unwrap();
    assert_eq!(document.source_spans(inner), &[SourceSpan::new(0, 3, 3, 1)]);
}

#[test]
fn link_spans_cover_brackets_and_destination() {
    let document = parse_with_spans("x [a](/b) y", SourceSpanMode::BlocksAndInlines);
    let paragraph = document.first_child(document.root()).unwrap();
    let link = children(&document, paragraph)[1];
    assert!(matches!(document.value(link), NodeValue::Link(_)));
    assert_eq!(document.source_spans(link), &[SourceSpan::new(0, 2, 2, 7)]);
}

#[test]
fn spans_use_byte_offsets() {
    let document = parse_with_spans("é\n\nb", SourceSpanMode::Blocks);
    let blocks = children(&document, document.root());
    assert_eq!(document.source_spans(blocks[0]), &[SourceSpan::new(0, 0, 0, 2)]);
    assert_eq!(document.source_spans(blocks[1]), &[SourceSpan::new(2, 0, 4, 1)]);
}

#[test]
fn tree_serializes_to_json() {
    let document = parse("*a*");
    let json = serde_json::to_value(document.to_tree(document.root())).unwrap();
    assert_eq!(json["value"], serde_json::json!("Document"));
    assert_eq!(json["children"][0]["value"], serde_json::json!("Paragraph"));
    assert_eq!(
        json["children"][0]["children"][0]["value"],
        serde_json::json!({ "Emphasis": { "delimiter": "*" } })
    );
    let tree: TreeNode = serde_json::from_value(json).unwrap();
    assert_eq!(tree, document.to_tree(document.root()));
}
