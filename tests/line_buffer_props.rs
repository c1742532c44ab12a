// tests/line_buffer_props.rs

use proptest::prelude::*;
use procline::process::LineBuffer;

// Drain a buffer the way a read does: complete lines, then the partial tail.
fn drain(buf: &mut LineBuffer) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(line) = buf.pop_line() {
        lines.push(line);
    }
    lines.extend(buf.take_partial());
    lines
}

fn expected_lines(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();
    // A trailing newline (or empty input) leaves an empty tail, which is never emitted.
    if lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

proptest! {
    #[test]
    fn chunking_does_not_change_the_lines(
        text in "[a-z \n]{0,200}",
        cuts in proptest::collection::vec(any::<usize>(), 0..10),
    ) {
        let bytes = text.as_bytes();
        let mut points: Vec<usize> = cuts.iter().map(|c| c % (bytes.len() + 1)).collect();
        points.sort_unstable();

        let mut buf = LineBuffer::new();
        let mut start = 0;
        for p in points {
            buf.feed(&bytes[start..p]);
            start = p;
        }
        buf.feed(&bytes[start..]);

        prop_assert_eq!(drain(&mut buf), expected_lines(&text));
    }

    #[test]
    fn multibyte_characters_survive_any_split(
        text in "[é€a\n]{0,60}",
        cut in any::<usize>(),
    ) {
        let bytes = text.as_bytes();
        let cut = cut % (bytes.len() + 1);

        let mut buf = LineBuffer::new();
        buf.feed(&bytes[..cut]);
        buf.feed(&bytes[cut..]);

        let lines = drain(&mut buf);
        prop_assert!(lines.iter().all(|l| !l.contains('\u{FFFD}')), "line contains U+FFFD replacement char");
        prop_assert_eq!(lines, expected_lines(&text));
    }
}
