use lopdf::content::{Content, Operation};

use crate::error::ContextError;

/// Combines the content already present on a page with the new drawing operators.
///
/// The existing content is replayed in a graphics state of its own, so whatever transformation
/// it leaves active is discarded before the new operators are drawn. The fragments are, in order,
/// `q`, the existing content, `Q` and the encoded operators.
pub fn merge_fragments(
    existing_content: Vec<u8>,
    operations: Vec<Operation>,
) -> Result<Vec<Vec<u8>>, ContextError> {
    let new_content = Content { operations }
        .encode()
        .map_err(|error| ContextError::with_error("Failed to encode the page drawings", &error))?;

    Ok(vec![b"q".to_vec(), existing_content, b"Q".to_vec(), new_content])
}

/// Joins the fragments into a single content stream, each fragment on its own line.
pub fn content_stream(fragments: Vec<Vec<u8>>) -> lopdf::Stream {
    let content = fragments.join(&b'\n');
    lopdf::Stream::new(lopdf::Dictionary::new(), content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::Object::Integer;

    #[test]
    fn existing_content_is_isolated_from_the_drawings() {
        let existing_content = b"2 0 0 2 0 0 cm\n0 0 10 10 re f".to_vec();
        let operations = vec![
            Operation::new("m", vec![Integer(1), Integer(2)]),
            Operation::new("l", vec![Integer(3), Integer(4)]),
            Operation::new("S", vec![]),
        ];
        let stream = content_stream(merge_fragments(existing_content, operations).unwrap());

        similar_asserts::assert_eq!(
            String::from_utf8(stream.content.clone()).unwrap(),
            "q\n2 0 0 2 0 0 cm\n0 0 10 10 re f\nQ\n1 2 m\n3 4 l\nS\n"
        );

        // The transformation of the existing content is popped before the drawings start
        let operators: Vec<String> = Content::decode(&stream.content)
            .unwrap()
            .operations
            .into_iter()
            .map(|operation| operation.operator)
            .collect();
        assert_eq!(operators, vec!["q", "cm", "re", "f", "Q", "m", "l", "S"]);
    }

    #[test]
    fn empty_page_still_gets_balanced_fragments() {
        let fragments = merge_fragments(Vec::new(), vec![Operation::new("S", vec![])]).unwrap();

        assert_eq!(fragments.len(), 4);
        assert_eq!(fragments[0], b"q");
        assert!(fragments[1].is_empty());
        assert_eq!(fragments[2], b"Q");
    }
}
