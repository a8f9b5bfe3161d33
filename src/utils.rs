use std::ops::Range;

use imara_diff::{
    intern::{Interner, Token},
    Algorithm,
};
use memchr::memmem;

/// Replace all occurrences of `from` with `to` in `input`.
///
/// This function is optimized for the case where no replacements are made.
///
/// # Arguments
///
/// * `input` - The input string to search for replacements.
/// * `from` - The `Finder` to search for. Must be created from valid UTF-8.
/// * `to` - The string to replace `from` with.
/// * `scratch_buffer` - A buffer to store the result in. Is expected to be empty.
///
/// # Returns
///
/// A tuple containing the modified `input` and the `clear`ed `scratch_buffer`.
///
/// # Panics
///
/// Might panic if `from` is not valid UTF-8.
pub(crate) fn str_replace_opt(
    mut input: String,
    from: &memmem::Finder,
    to: &str,
    scratch_buffer: String,
) -> (String, String) {
    let mut result = scratch_buffer;
    let mut last_end = 0;
    let mut matched = false;
    for start in from.find_iter(input.as_bytes()) {
        let end = start + from.needle().len();

        // string indexing could panic if the Finder is not valid UTF-8
        result.push_str(&input[last_end..start]);
        result.push_str(to);

        last_end = end;
        matched = true;
    }

    if !matched {
        // no need to clear the scratch buffer, since it's already empty
        (input, result)
    } else {
        // copy the remaining text
        result.push_str(&input[last_end..]);

        input.clear();
        (result, input)
    }
}

/// Lowercase the first character of `input`, leaving the rest untouched.
///
/// MediaWiki titles (and therefore template names) are case-insensitive in
/// their first letter only.
pub fn lowercase_first(input: &str) -> String {
    let mut chars = input.chars();
    let mut result = String::with_capacity(input.len());
    if let Some(c) = chars.next() {
        match unicode_case_mapping::to_lowercase(c) {
            [0, 0] => result.push(c),
            [l, 0] => result.extend(char::from_u32(l)),
            [l, l2] => {
                result.extend(char::from_u32(l));
                result.extend(char::from_u32(l2));
            }
        }
    }
    result.push_str(chars.as_str());
    result
}

/// Normalize a page or template name for comparison: surrounding whitespace
/// is dropped, underscores count as spaces, runs of spaces collapse and the
/// first letter is lowercased.
pub fn normalize_name(input: &str) -> String {
    let mut collapsed = String::with_capacity(input.len());
    for word in input
        .split(|c: char| c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
    {
        if !collapsed.is_empty() {
            collapsed.push(' ');
        }
        collapsed.push_str(word);
    }
    lowercase_first(&collapsed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeTag {
    Equal,
    Insert,
    Delete,
}

/// Line based diff of `old` against `new` using the histogram algorithm.
///
/// Deleted lines of a hunk are reported before the inserted ones.
pub fn line_diff<'a>(old: &'a str, new: &'a str) -> Vec<(ChangeTag, &'a str)> {
    let mut interner: Interner<&'a str> = Interner::new(old.len() / 16 + new.len() / 16 + 1);
    let old_tokens: Vec<Token> = old.lines().map(|line| interner.intern(line)).collect();
    let new_tokens: Vec<Token> = new.lines().map(|line| interner.intern(line)).collect();

    let mut changes = Vec::new();
    let mut last_old_pos = 0;
    imara_diff::diff_with_tokens(
        Algorithm::Histogram,
        &old_tokens,
        &new_tokens,
        interner.num_tokens(),
        |before: Range<u32>, after: Range<u32>| {
            if before.start > last_old_pos {
                for token in &old_tokens[last_old_pos as usize..before.start as usize] {
                    changes.push((ChangeTag::Equal, *token));
                }
            }
            last_old_pos = before.end;

            for token in &old_tokens[before.start as usize..before.end as usize] {
                changes.push((ChangeTag::Delete, *token));
            }

            for token in &new_tokens[after.start as usize..after.end as usize] {
                changes.push((ChangeTag::Insert, *token));
            }
        },
    );

    if (last_old_pos as usize) < old_tokens.len() {
        for token in &old_tokens[last_old_pos as usize..] {
            changes.push((ChangeTag::Equal, *token));
        }
    }

    changes
        .into_iter()
        .map(|(tag, token)| (tag, interner[token]))
        .collect()
}

/// Render the changed lines of a diff with `context` unchanged lines around
/// each change, in the familiar `-`/`+` notation.
pub fn format_line_diff(old: &str, new: &str, context: usize) -> String {
    let changes = line_diff(old, new);

    let mut keep = vec![false; changes.len()];
    for (i, (tag, _)) in changes.iter().enumerate() {
        if *tag != ChangeTag::Equal {
            let from = i.saturating_sub(context);
            let to = (i + context + 1).min(changes.len());
            keep[from..to].iter_mut().for_each(|k| *k = true);
        }
    }

    let mut output = String::new();
    let mut skipped = false;
    for ((tag, line), keep) in changes.iter().zip(keep) {
        if !keep {
            skipped = true;
            continue;
        }
        if skipped {
            output.push_str("@@\n");
            skipped = false;
        }
        let prefix = match tag {
            ChangeTag::Equal => "  ",
            ChangeTag::Insert => "+ ",
            ChangeTag::Delete => "- ",
        };
        output.push_str(prefix);
        output.push_str(line);
        output.push('\n');
    }
    output
}
