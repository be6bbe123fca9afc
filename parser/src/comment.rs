// Comment text cleanup for descriptions.

const LICENSE_MARKER: &str = "License";

/// Strips `//` markers from every line of a line-comment run.
pub fn clean_line_comment(comment: &str) -> String {
    let lines: Vec<&str> = comment
        .lines()
        .map(|l| l.trim().trim_start_matches('/').trim())
        .collect();
    lines.join("\n").trim().to_string()
}

/// Strips `/*`, `*/` and leading `*` decoration from a block comment.
pub fn clean_block_comment(comment: &str) -> String {
    let lines: Vec<&str> = comment
        .lines()
        .map(|l| {
            let l = l.trim();
            let l = l.strip_prefix("/*").unwrap_or(l);
            let l = l.strip_suffix("*/").unwrap_or(l);
            l.trim().trim_start_matches('*').trim()
        })
        .collect();
    lines.join("\n").trim().to_string()
}

pub fn is_license(comment: &str) -> bool {
    comment.contains(LICENSE_MARKER)
}
